use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::error::VolpipeError;
use crate::kernels::zstd as zstd_kernel;
use crate::pipeline::executor::{
    decode, decode_into, encode, encode_into, max_compressed_length, max_compressed_length_nd, shared_pool,
};
use crate::pipeline::header::{header_bound, header_len_for, Header};
use crate::pipeline::inspector;
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::{DataView, Stage, StreamTransform};
use crate::pipeline::descriptor::pipeline_possible;
use crate::types::{ElementType, Shape};

//==================================================================================
// Test Stages
//==================================================================================

/// Emits every input byte twice.
#[derive(Debug)]
struct DoubleStage;

impl Stage for DoubleStage {
    fn name(&self) -> &str {
        "A"
    }

    fn transform(&self) -> StreamTransform {
        StreamTransform::ToBytes
    }

    fn max_encoded_size(&self, input_size: usize, _view: &DataView) -> Result<usize, VolpipeError> {
        input_size
            .checked_mul(2)
            .ok_or_else(|| VolpipeError::ShapeOverflow("double".into()))
    }

    fn encode(&self, input: &[u8], _view: &DataView) -> Result<Vec<u8>, VolpipeError> {
        Ok(input.iter().flat_map(|&b| [b, b]).collect())
    }

    fn decode(&self, input: &[u8], _target: Option<&DataView>, _max_len: usize) -> Result<Vec<u8>, VolpipeError> {
        if input.len() % 2 != 0 {
            return Err(VolpipeError::BufferMismatch {
                expected: input.len() - 1,
                actual: input.len(),
            });
        }
        Ok(input.iter().step_by(2).copied().collect())
    }
}

/// Appends a 16-byte trailer.
#[derive(Debug)]
struct PadStage;

const PAD: [u8; 16] = [0xA5; 16];

impl Stage for PadStage {
    fn name(&self) -> &str {
        "B"
    }

    fn transform(&self) -> StreamTransform {
        StreamTransform::ToBytes
    }

    fn max_encoded_size(&self, input_size: usize, _view: &DataView) -> Result<usize, VolpipeError> {
        input_size
            .checked_add(PAD.len())
            .ok_or_else(|| VolpipeError::ShapeOverflow("pad".into()))
    }

    fn encode(&self, input: &[u8], _view: &DataView) -> Result<Vec<u8>, VolpipeError> {
        let mut out = input.to_vec();
        out.extend_from_slice(&PAD);
        Ok(out)
    }

    fn decode(&self, input: &[u8], _target: Option<&DataView>, _max_len: usize) -> Result<Vec<u8>, VolpipeError> {
        match input.strip_suffix(&PAD[..]) {
            Some(body) => Ok(body.to_vec()),
            None => Err(VolpipeError::InternalError("missing trailer".into())),
        }
    }
}

/// A pass-through stage that counts how often it runs.
#[derive(Debug, Default)]
struct CountingStage {
    encodes: AtomicUsize,
    decodes: AtomicUsize,
}

impl Stage for CountingStage {
    fn name(&self) -> &str {
        "count"
    }

    fn transform(&self) -> StreamTransform {
        StreamTransform::PreserveLayout
    }

    fn max_encoded_size(&self, input_size: usize, _view: &DataView) -> Result<usize, VolpipeError> {
        Ok(input_size)
    }

    fn encode(&self, input: &[u8], _view: &DataView) -> Result<Vec<u8>, VolpipeError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        Ok(input.to_vec())
    }

    fn decode(&self, input: &[u8], _target: Option<&DataView>, _max_len: usize) -> Result<Vec<u8>, VolpipeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        Ok(input.to_vec())
    }
}

/// Claims to preserve the layout but grows the stream.
#[derive(Debug)]
struct GrowingStage;

impl Stage for GrowingStage {
    fn name(&self) -> &str {
        "grow"
    }

    fn transform(&self) -> StreamTransform {
        StreamTransform::PreserveLayout
    }

    fn max_encoded_size(&self, input_size: usize, _view: &DataView) -> Result<usize, VolpipeError> {
        Ok(input_size + 1)
    }

    fn encode(&self, input: &[u8], _view: &DataView) -> Result<Vec<u8>, VolpipeError> {
        let mut out = input.to_vec();
        out.push(0);
        Ok(out)
    }

    fn decode(&self, input: &[u8], _target: Option<&DataView>, _max_len: usize) -> Result<Vec<u8>, VolpipeError> {
        Ok(input[..input.len().saturating_sub(1)].to_vec())
    }
}

/// A byte stage whose decoder ignores its ceiling and expands a thousandfold.
#[derive(Debug)]
struct InflatingStage;

impl Stage for InflatingStage {
    fn name(&self) -> &str {
        "inflate"
    }

    fn transform(&self) -> StreamTransform {
        StreamTransform::ToBytes
    }

    fn max_encoded_size(&self, input_size: usize, _view: &DataView) -> Result<usize, VolpipeError> {
        Ok(input_size)
    }

    fn encode(&self, input: &[u8], _view: &DataView) -> Result<Vec<u8>, VolpipeError> {
        Ok(input.to_vec())
    }

    fn decode(&self, input: &[u8], _target: Option<&DataView>, _max_len: usize) -> Result<Vec<u8>, VolpipeError> {
        Ok(vec![0u8; input.len() * 1000])
    }
}

//==================================================================================
// Test Helpers
//==================================================================================

fn test_registry() -> StageRegistry {
    registry_with(&EngineConfig::default())
}

fn registry_with(config: &EngineConfig) -> StageRegistry {
    let mut registry = StageRegistry::with_builtins(config).unwrap();
    registry.register_stage(Arc::new(DoubleStage)).unwrap();
    registry.register_stage(Arc::new(PadStage)).unwrap();
    registry.register_stage(Arc::new(GrowingStage)).unwrap();
    registry.register_stage(Arc::new(InflatingStage)).unwrap();
    registry
}

/// A valid header for an 8-byte `u8` volume followed by an arbitrary payload.
fn header_with_payload(pipeline: &str, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Header::new(pipeline, Shape::linear(8).unwrap(), ElementType::UInt8)
        .to_bytes()
        .unwrap();
    bytes.extend_from_slice(payload);
    bytes
}

/// Smooth values with a little noise, as a microscope would record them.
fn random_volume(rng: &mut StdRng, shape: &Shape, dtype: ElementType) -> Vec<u8> {
    let num_bytes = shape.num_bytes(dtype).unwrap();
    let width = dtype.size_of();
    (0..num_bytes)
        .map(|i| {
            if i % width == 0 {
                rng.random_range(0..16u8)
            } else {
                rng.random::<u8>() & 0x01
            }
        })
        .collect()
}

const LOSSLESS_PIPELINES: &[&str] = &[
    "pass_through",
    "shuffle",
    "zstd",
    "shuffle->zstd",
    "xor_delta->shuffle->zstd",
    "zstd->pass_through",
    "zstd->zstd",
    "A->B",
    "xor_delta->A->B",
    "A->shuffle->B",
    "zstd(level=19)",
    "shuffle->zstd(level=1)->zstd(level=22)",
];

const SHAPES: &[&[usize]] = &[&[1], &[37], &[4, 9], &[3, 5, 7], &[2, 1, 3, 1, 2]];

//==================================================================================
// Round-Trip & Bound Properties
//==================================================================================

#[test]
fn test_lossless_roundtrip_all_dtypes_and_shapes() {
    let registry = test_registry();
    let mut rng = StdRng::seed_from_u64(0x5EED);

    for &pipeline in LOSSLESS_PIPELINES {
        for dtype in ElementType::ALL {
            for extents in SHAPES {
                let shape = Shape::new(extents).unwrap();
                let src = random_volume(&mut rng, &shape, dtype);

                let encoded = encode(&registry, pipeline, &src, &shape, dtype, 1).unwrap();
                let (header, decoded) = decode(&registry, &encoded, 1).unwrap();

                assert_eq!(decoded, src, "{} {} {} failed to round-trip", pipeline, dtype, shape);
                assert_eq!(header.shape(), &shape);
                assert_eq!(header.dtype(), dtype);
                assert_eq!(header.pipeline(), pipeline);
            }
        }
    }
}

#[test]
fn test_encoded_length_never_exceeds_bounds() {
    let registry = test_registry();
    let mut rng = StdRng::seed_from_u64(42);

    for &pipeline in LOSSLESS_PIPELINES {
        for dtype in [ElementType::UInt8, ElementType::UInt16, ElementType::Float64] {
            for extents in SHAPES {
                let shape = Shape::new(extents).unwrap();
                // Fully random bytes are the worst case for the entropy stage.
                let num_bytes = shape.num_bytes(dtype).unwrap();
                let src: Vec<u8> = (0..num_bytes).map(|_| rng.random::<u8>()).collect();

                let encoded = encode(&registry, pipeline, &src, &shape, dtype, 1).unwrap();
                let nd_bound = max_compressed_length_nd(&registry, pipeline, &shape, dtype).unwrap();
                let size_bound = max_compressed_length(&registry, pipeline, num_bytes, dtype).unwrap();
                assert!(encoded.len() <= nd_bound, "{} exceeded shape-aware bound", pipeline);
                assert!(nd_bound <= size_bound, "{} size-only bound is tighter", pipeline);
            }
        }
    }
}

#[test]
fn test_decompressed_length_matches_source() {
    let registry = test_registry();
    let mut rng = StdRng::seed_from_u64(7);
    let shape = Shape::new(&[6, 10, 3]).unwrap();
    let src = random_volume(&mut rng, &shape, ElementType::Int16);

    let encoded = encode(&registry, "xor_delta->zstd", &src, &shape, ElementType::Int16, 1).unwrap();
    assert_eq!(inspector::decompressed_length(&encoded).unwrap(), src.len());
    assert_eq!(inspector::decompressed_shape(&encoded).unwrap(), vec![6, 10, 3]);
    assert_eq!(inspector::decompressed_sizeof(&encoded).unwrap(), 2);
    assert_eq!(
        inspector::header_size(&encoded).unwrap(),
        header_len_for("xor_delta->zstd".len(), 3).unwrap()
    );
}

#[test]
fn test_thread_count_does_not_change_output() {
    let registry = test_registry();
    let mut rng = StdRng::seed_from_u64(99);
    let shape = Shape::new(&[16, 32, 8]).unwrap();
    let dtype = ElementType::UInt16;
    let src = random_volume(&mut rng, &shape, dtype);

    for pipeline in ["shuffle->zstd", "xor_delta->shuffle->zstd", "rmbkg->shuffle->zstd"] {
        let single = encode(&registry, pipeline, &src, &shape, dtype, 1).unwrap();
        let multi = encode(&registry, pipeline, &src, &shape, dtype, 4).unwrap();
        assert_eq!(single, multi, "{} differs across thread counts", pipeline);

        let (_, decoded_single) = decode(&registry, &single, 1).unwrap();
        let (_, decoded_multi) = decode(&registry, &single, 4).unwrap();
        assert_eq!(decoded_single, decoded_multi);
    }
}

#[test]
fn test_outer_axis_stages_restart_per_slab() {
    let registry = test_registry();
    let shape = Shape::new(&[2, 4]).unwrap();
    let src: Vec<u8> = vec![1, 2, 3, 4, 9, 9, 9, 9];

    let encoded = encode(&registry, "xor_delta", &src, &shape, ElementType::UInt8, 1).unwrap();
    let payload = &encoded[inspector::header_size(&encoded).unwrap()..];
    // The second slab starts from its own first value, not from the first slab's last.
    assert_eq!(payload, &[1, 3, 1, 7, 9, 0, 0, 0]);
}

#[test]
fn test_lossy_pipeline_keeps_shape_and_length() {
    let registry = test_registry();
    let shape = Shape::new(&[4, 4]).unwrap();
    let values: Vec<u16> = vec![100, 100, 100, 100, 100, 100, 120, 100, 100, 100, 100, 100, 100, 100, 100, 300];
    let src = crate::utils::typed_slice_to_bytes(&values);

    let encoded = encode(&registry, "rmbkg->shuffle->zstd", &src, &shape, ElementType::UInt16, 1).unwrap();
    let (header, decoded) = decode(&registry, &encoded, 1).unwrap();
    assert_eq!(header.shape(), &shape);
    assert_eq!(decoded.len(), src.len());

    let restored: Vec<u16> = crate::utils::bytes_to_typed_vec(&decoded).unwrap();
    assert_eq!(restored[6], 20);
    assert_eq!(restored[15], 200);
    assert_eq!(restored[0], 0);
}

//==================================================================================
// Scenarios
//==================================================================================

#[test]
fn test_scenario_bound_of_double_then_pad() {
    let registry = test_registry();

    let size_only = max_compressed_length(&registry, "A->B", 1024, ElementType::UInt8).unwrap();
    assert_eq!(size_only, header_bound("A->B".len()).unwrap() + 1024 * 2 + 16);

    let shape = Shape::new(&[512]).unwrap();
    let shape_aware = max_compressed_length_nd(&registry, "A->B", &shape, ElementType::UInt16).unwrap();
    assert_eq!(shape_aware, header_len_for("A->B".len(), 1).unwrap() + 2064);

    let src = vec![3u8; 1024];
    let encoded = encode(&registry, "A->B", &src, &shape, ElementType::UInt16, 1).unwrap();
    assert_eq!(encoded.len(), shape_aware);
}

#[test]
fn test_scenario_destination_one_byte_short() {
    let registry = test_registry();
    let shape = Shape::new(&[512]).unwrap();
    let src = vec![3u8; 1024];
    let needed = encode(&registry, "A->B", &src, &shape, ElementType::UInt16, 1).unwrap().len();

    let mut dst = vec![0u8; needed - 1];
    let result = encode_into(&registry, "A->B", &src, &shape, ElementType::UInt16, &mut dst, 1);
    match result {
        Err(err @ VolpipeError::DestinationTooSmall { .. }) => {
            assert_eq!(err.code().as_i32(), 1);
            if let VolpipeError::DestinationTooSmall { required, available } = err {
                assert_eq!(required, needed);
                assert_eq!(available, needed - 1);
            }
        }
        other => panic!("expected DestinationTooSmall, got {:?}", other),
    }

    let mut dst = vec![0u8; needed];
    let written = encode_into(&registry, "A->B", &src, &shape, ElementType::UInt16, &mut dst, 1).unwrap();
    assert_eq!(written, needed);
}

#[test]
fn test_scenario_header_too_large_for_destination() {
    let registry = test_registry();
    let shape = Shape::new(&[4]).unwrap();
    let mut dst = [0u8; 8];
    let result = encode_into(&registry, "zstd", &[0u8; 4], &shape, ElementType::UInt8, &mut dst, 1);
    assert!(matches!(result, Err(VolpipeError::DestinationTooSmall { available: 8, .. })));
}

#[test]
fn test_scenario_unknown_stage_in_header_runs_no_decoder() {
    let mut registry = test_registry();
    let counter = Arc::new(CountingStage::default());
    registry.register("count", counter.clone()).unwrap();

    let shape = Shape::linear(8).unwrap();
    let mut bytes = Header::new("count->lz4", shape, ElementType::UInt8).to_bytes().unwrap();
    bytes.extend_from_slice(&[0u8; 8]);

    match decode(&registry, &bytes, 1) {
        Err(VolpipeError::UnknownStage { name, position }) => {
            assert_eq!(name, "lz4");
            assert_eq!(position, 1);
        }
        other => panic!("expected UnknownStage, got {:?}", other),
    }
    assert_eq!(counter.decodes.load(Ordering::SeqCst), 0);

    // The same registry decodes a resolvable header.
    let encoded = encode(&registry, "count", &[1u8; 8], &Shape::linear(8).unwrap(), ElementType::UInt8, 1).unwrap();
    decode(&registry, &encoded, 1).unwrap();
    assert_eq!(counter.encodes.load(Ordering::SeqCst), 1);
    assert_eq!(counter.decodes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scenario_pipeline_possible() {
    let registry = test_registry();
    assert!(!pipeline_possible("", &registry));
    assert!(!pipeline_possible("NoSuchStage", &registry));
    assert!(pipeline_possible("A->B", &registry));
    assert!(!pipeline_possible("A->B", &StageRegistry::new()));
}

//==================================================================================
// Error Paths
//==================================================================================

#[test]
fn test_source_length_must_match_shape() {
    let registry = test_registry();
    let shape = Shape::new(&[10]).unwrap();
    let result = encode(&registry, "zstd", &[0u8; 19], &shape, ElementType::UInt16, 1);
    assert!(matches!(
        result,
        Err(VolpipeError::BufferMismatch { expected: 20, actual: 19 })
    ));
}

#[test]
fn test_invalid_pipeline_is_rejected_before_work() {
    let registry = test_registry();
    let shape = Shape::new(&[4]).unwrap();
    let mut dst = [0u8; 256];
    assert!(matches!(
        encode_into(&registry, "shuffle->", &[0u8; 4], &shape, ElementType::UInt8, &mut dst, 1),
        Err(VolpipeError::InvalidPipeline { .. })
    ));
    assert!(matches!(
        encode_into(&registry, "lz4", &[0u8; 4], &shape, ElementType::UInt8, &mut dst, 1),
        Err(VolpipeError::UnknownStage { position: 0, .. })
    ));
}

#[test]
fn test_layout_violation_is_stage_failure() {
    let registry = test_registry();
    let shape = Shape::new(&[4]).unwrap();
    let result = encode(&registry, "grow->zstd", &[1u8; 4], &shape, ElementType::UInt8, 1);
    match result {
        Err(VolpipeError::StageFailed { stage, .. }) => assert_eq!(stage, "grow"),
        other => panic!("expected StageFailed, got {:?}", other),
    }
}

#[test]
fn test_decode_destination_too_small() {
    let registry = test_registry();
    let shape = Shape::new(&[8, 8]).unwrap();
    let src = vec![5u8; 128];
    let encoded = encode(&registry, "shuffle->zstd", &src, &shape, ElementType::UInt16, 1).unwrap();

    let mut dst = vec![0u8; 127];
    assert!(matches!(
        decode_into(&registry, &encoded, &mut dst, 1),
        Err(VolpipeError::DestinationTooSmall { required: 128, available: 127 })
    ));

    let mut dst = vec![0u8; 200];
    assert_eq!(decode_into(&registry, &encoded, &mut dst, 1).unwrap(), 128);
    assert_eq!(&dst[..128], &src[..]);
}

#[test]
fn test_corrupted_payload_is_stage_failure() {
    let registry = test_registry();
    let shape = Shape::new(&[64]).unwrap();
    let src: Vec<u8> = (0..64).collect();
    let mut encoded = encode(&registry, "zstd", &src, &shape, ElementType::UInt8, 1).unwrap();
    let header_len = inspector::header_size(&encoded).unwrap();
    encoded.truncate(header_len + 10);

    assert!(matches!(
        decode(&registry, &encoded, 1),
        Err(VolpipeError::StageFailed { .. })
    ));
}

#[test]
fn test_truncated_header_is_parse_error() {
    let registry = test_registry();
    assert!(matches!(
        decode(&registry, b"VPIP", 1),
        Err(VolpipeError::HeaderParseError(_))
    ));
}

//==================================================================================
// Stage Arguments
//==================================================================================

#[test]
fn test_stage_arguments_travel_in_the_header() {
    let pipeline = "rmbkg(epsilon=5)->shuffle->zstd(level=9)";
    let shape = Shape::new(&[2, 4]).unwrap();
    let values: Vec<u16> = vec![100, 100, 100, 120, 100, 100, 104, 300];
    let src = crate::utils::typed_slice_to_bytes(&values);

    let defaults = test_registry();
    let tuned = registry_with(&EngineConfig {
        zstd_level: 1,
        rmbkg_epsilon: 50,
        ..EngineConfig::default()
    });

    // The arguments override each registry's configuration, so both agree.
    let encoded = encode(&defaults, pipeline, &src, &shape, ElementType::UInt16, 1).unwrap();
    let encoded_tuned = encode(&tuned, pipeline, &src, &shape, ElementType::UInt16, 1).unwrap();
    assert_eq!(encoded, encoded_tuned);
    assert_eq!(inspector::pipeline_of(&encoded).unwrap(), pipeline);

    let (_, decoded) = decode(&tuned, &encoded, 1).unwrap();
    let restored: Vec<u16> = crate::utils::bytes_to_typed_vec(&decoded).unwrap();
    assert_eq!(restored, vec![0, 0, 0, 15, 0, 0, 0, 195]);

    assert!(pipeline_possible(pipeline, &defaults));
    assert!(!pipeline_possible("rmbkg(epsilon=-1)->zstd", &defaults));
    assert!(!pipeline_possible("A(x=1)->B", &defaults));
}

#[test]
fn test_argument_bound_matches_encoding() {
    let registry = test_registry();
    let shape = Shape::new(&[64]).unwrap();
    let src: Vec<u8> = (0..64).map(|i| (i * 37 % 251) as u8).collect();
    for pipeline in ["zstd(level=1)", "zstd(level=22)->zstd"] {
        let bound = max_compressed_length_nd(&registry, pipeline, &shape, ElementType::UInt8).unwrap();
        let encoded = encode(&registry, pipeline, &src, &shape, ElementType::UInt8, 1).unwrap();
        assert!(encoded.len() <= bound);
    }
    assert!(matches!(
        max_compressed_length(&registry, "zstd(level=23)", 64, ElementType::UInt8),
        Err(VolpipeError::InvalidPipeline { .. })
    ));
}

//==================================================================================
// Hostile Payloads
//==================================================================================

#[test]
fn test_maximal_length_prefix_is_stage_failure() {
    let registry = test_registry();
    let mut payload = u64::MAX.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0x28, 0xB5, 0x2F, 0xFD]);

    match decode(&registry, &header_with_payload("zstd->zstd", &payload), 1) {
        Err(VolpipeError::StageFailed { stage, .. }) => assert_eq!(stage, "zstd"),
        other => panic!("expected StageFailed, got {:?}", other),
    }
}

#[test]
fn test_nested_byte_stage_is_capped_by_its_bound() {
    let registry = test_registry();
    // An 8-byte volume can never need a 4 KiB intermediate stream.
    let mut outer = Vec::new();
    zstd_kernel::encode(&[0u8; 4096], &mut outer, 3).unwrap();

    match decode(&registry, &header_with_payload("zstd->zstd", &outer), 1) {
        Err(VolpipeError::StageFailed { stage, source }) => {
            assert_eq!(stage, "zstd");
            assert!(source.to_string().contains("at most"), "{}", source);
        }
        other => panic!("expected StageFailed, got {:?}", other),
    }
}

#[test]
fn test_stage_ignoring_its_ceiling_is_rejected() {
    let registry = test_registry();
    let encoded = encode(&registry, "B->inflate", &[1u8; 8], &Shape::linear(8).unwrap(), ElementType::UInt8, 1).unwrap();

    match decode(&registry, &encoded, 1) {
        Err(VolpipeError::StageFailed { stage, source }) => {
            assert_eq!(stage, "inflate");
            assert!(matches!(*source, VolpipeError::BufferMismatch { expected: 24, .. }));
        }
        other => panic!("expected StageFailed, got {:?}", other),
    }
}

//==================================================================================
// Worker Pools
//==================================================================================

#[test]
fn test_worker_pools_are_reused() {
    let first = shared_pool(3).unwrap();
    let second = shared_pool(3).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.current_num_threads(), 3);
    assert!(!Arc::ptr_eq(&first, &shared_pool(2).unwrap()));
}
