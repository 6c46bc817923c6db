use tower_http::compression::{
    predicate::{And, DefaultPredicate, Predicate, SizeAbove},
    CompressionLayer,
};

/// Responses smaller than this are sent as is.
const MIN_COMPRESSED_SIZE: u16 = 1024;

/// Compression layer negotiating the encoding from `Accept-Encoding`. Only
/// bodies above [`MIN_COMPRESSED_SIZE`] are compressed, which in practice
/// means the inventory page.
pub fn compression_layer() -> CompressionLayer<And<DefaultPredicate, SizeAbove>> {
    CompressionLayer::new()
        .compress_when(DefaultPredicate::new().and(SizeAbove::new(MIN_COMPRESSED_SIZE)))
}
