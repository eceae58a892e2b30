// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing API of the volpipe library. It provides a
// stable interface over the pure `pipeline` engine, bound to the process-wide
// stage registry. It is the authoritative boundary between host applications
// (storage filters, language bindings, tools) and the internal engine.
//
// Data Flow (Encode):
//
//   1. [Status API (pipeline_encode)]        -> Receives slices + out-params
//         |
//         `-> maps `Result` onto an integer `ErrorCode` ->
//
//   2. [Stateless API (encode_into)]         -> Receives `&[u8]`, shape, dtype
//         |
//         `-> a. Validates the shape
//         |
//         `-> b. Calls the pure engine with the global registry
//
//   3. [Pipeline Engine (pipeline::executor)] -> header + stage outputs into `dst`
//
//
// Data Flow (Decode):
//
//   1. [Pipeline Engine (pipeline::executor)] -> Parses header, resolves stages,
//                                                runs decoders in reverse
//   2. [Stateless API (decode_into)]          -> Returns bytes written
//   3. [Status API (pipeline_decode)]         -> Returns `0` or an error code
//
// ====================================================================================
pub mod format;
pub mod stateless_api;
pub mod status_api;

// --- Result-returning API ---
pub use stateless_api::{
    analyze, decode, decode_into, decode_typed, encode, encode_into, encode_typed, max_compressed_length,
    max_compressed_length_nd, pipeline_possible, version_triple,
};

// --- Format Constants and Structs ---
pub use format::{CompressionStats, DEFAULT_PIPELINE, MAX_NDIMS, PIPELINE_DELIMITER};
