// In: src/pipeline/executor.rs

//! This module contains the core execution logic for the encode and decode
//! pipelines.
//!
//! It is a "pure byte engine": it resolves a pipeline, tracks the layout each
//! stage sees, runs the stages in order (or reverse order for decode) and
//! enforces the destination capacity. It knows nothing about what any
//! particular stage does beyond its declared `StreamTransform` and
//! `Partitioning`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use rayon::prelude::*;

use crate::error::VolpipeError;
use crate::pipeline::descriptor::{PipelineDescriptor, ResolvedStage};
use crate::pipeline::estimator;
use crate::pipeline::header::Header;
use crate::pipeline::registry::StageRegistry;
use crate::pipeline::stage::{DataView, Partitioning, StreamTransform};
use crate::types::{ElementType, Shape};
use crate::utils::clean_thread_count;

//==================================================================================
// 1. Execution Context
//==================================================================================

/// Worker pools keyed by thread count. A pool is built the first time a call
/// asks for that many threads and reused by every later call.
static POOLS: OnceLock<Mutex<HashMap<usize, Arc<rayon::ThreadPool>>>> = OnceLock::new();

pub(crate) fn shared_pool(threads: usize) -> Result<Arc<rayon::ThreadPool>, VolpipeError> {
    // A poisoned lock only means another caller panicked while inserting; the
    // map itself is still consistent.
    let mut pools = POOLS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(pool) = pools.get(&threads) {
        return Ok(Arc::clone(pool));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("volpipe-{}-{}", threads, i))
        .build()
        .map_err(|e| VolpipeError::InternalError(format!("Failed to build thread pool: {}", e)))?;
    log::debug!("Built a {}-thread worker pool", threads);
    let pool = Arc::new(pool);
    pools.insert(threads, Arc::clone(&pool));
    Ok(pool)
}

/// Per-call execution resources: the cleaned thread budget and, when more
/// than one thread is allowed, the shared worker pool of that size.
pub struct ExecutionContext {
    threads: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ExecutionContext {
    /// Builds the context for a call. `requested == 0` selects the registry's
    /// configured default.
    pub fn new(requested: usize, registry: &StageRegistry) -> Result<Self, VolpipeError> {
        let threads = clean_thread_count(registry.config().resolve_threads(requested));
        let pool = if threads > 1 { Some(shared_pool(threads)?) } else { None };
        Ok(Self { threads, pool })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Applies `f` to consecutive `slab_len`-byte slabs of `input`, keeping
    /// the results in slab order.
    fn map_slabs<F>(&self, input: &[u8], slab_len: usize, f: F) -> Result<Vec<Vec<u8>>, VolpipeError>
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, VolpipeError> + Send + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| input.par_chunks(slab_len).map(&f).collect()),
            None => input.chunks(slab_len).map(&f).collect(),
        }
    }
}

//==================================================================================
// 2. Stage Application
//==================================================================================

/// Whether the executor splits `resolved` into outer-axis slabs on `view`.
fn slab_view(resolved: &ResolvedStage, view: &DataView) -> Option<DataView> {
    let stage = &resolved.stage;
    if stage.transform() == StreamTransform::PreserveLayout && stage.partitioning() == Partitioning::OuterAxis {
        view.slab()
    } else {
        None
    }
}

fn encode_stage(
    resolved: &ResolvedStage,
    input: &[u8],
    view: &DataView,
    ctx: &ExecutionContext,
) -> Result<Vec<u8>, VolpipeError> {
    let stage = &resolved.stage;
    let output = match slab_view(resolved, view) {
        Some(slab) => {
            let slab_len = slab.num_bytes()?;
            ctx.map_slabs(input, slab_len, |chunk| stage.encode(chunk, &slab))
                .map(|parts| parts.concat())
        }
        None => stage.encode(input, view),
    }
    .map_err(|e| VolpipeError::in_stage(&resolved.id, e))?;

    check_stage_output(resolved, input.len(), output.len())?;
    log_metric!(
        "event" = "stage_encode",
        "stage" = &resolved.id,
        "bytes_in" = &input.len(),
        "bytes_out" = &output.len()
    );
    Ok(output)
}

/// Decodes one stage. `max_len` is the most its encode input can have been;
/// without a target view it is the only size limit the stage gets.
fn decode_stage(
    resolved: &ResolvedStage,
    input: &[u8],
    target: Option<&DataView>,
    max_len: usize,
    ctx: &ExecutionContext,
) -> Result<Vec<u8>, VolpipeError> {
    let stage = &resolved.stage;
    // A layout-preserving stage decodes to its own input length.
    if stage.transform() == StreamTransform::PreserveLayout && input.len() > max_len {
        return Err(VolpipeError::in_stage(
            &resolved.id,
            VolpipeError::BufferMismatch {
                expected: max_len,
                actual: input.len(),
            },
        ));
    }

    let expected = target.map(DataView::num_bytes).transpose()?;
    let limit = expected.unwrap_or(max_len);

    let output = match target.and_then(|view| slab_view(resolved, view)) {
        Some(slab) => {
            let slab_len = slab.num_bytes()?;
            ctx.map_slabs(input, slab_len, |chunk| stage.decode(chunk, Some(&slab), slab_len))
                .map(|parts| parts.concat())
        }
        None => stage.decode(input, target, limit),
    }
    .map_err(|e| VolpipeError::in_stage(&resolved.id, e))?;

    let within = match expected {
        Some(expected) => output.len() == expected,
        None => output.len() <= max_len,
    };
    if !within {
        return Err(VolpipeError::in_stage(
            &resolved.id,
            VolpipeError::BufferMismatch {
                expected: limit,
                actual: output.len(),
            },
        ));
    }
    log_metric!(
        "event" = "stage_decode",
        "stage" = &resolved.id,
        "bytes_in" = &input.len(),
        "bytes_out" = &output.len()
    );
    Ok(output)
}

/// Enforces the declared layout contract on an encode output.
fn check_stage_output(resolved: &ResolvedStage, input_len: usize, output_len: usize) -> Result<(), VolpipeError> {
    match resolved.stage.transform() {
        StreamTransform::PreserveLayout if output_len != input_len => Err(VolpipeError::in_stage(
            &resolved.id,
            VolpipeError::BufferMismatch {
                expected: input_len,
                actual: output_len,
            },
        )),
        StreamTransform::ToBytes if output_len == 0 => Err(VolpipeError::in_stage(
            &resolved.id,
            VolpipeError::InternalError("stage produced an empty encoding".into()),
        )),
        _ => Ok(()),
    }
}

//==================================================================================
// 3. Encode
//==================================================================================

/// A finished encoding: the serialized header followed by the payload.
struct Encoded {
    header: Vec<u8>,
    payload: Vec<u8>,
}

impl Encoded {
    fn len(&self) -> usize {
        self.header.len() + self.payload.len()
    }
}

/// Runs the encode pipeline. When `capacity` is given, the header and every
/// stage output are checked against it as they are produced.
fn run_encode(
    descriptor: &PipelineDescriptor,
    src: &[u8],
    shape: &Shape,
    dtype: ElementType,
    capacity: Option<usize>,
    ctx: &ExecutionContext,
) -> Result<Encoded, VolpipeError> {
    let expected = shape.num_bytes(dtype)?;
    if src.len() != expected {
        return Err(VolpipeError::BufferMismatch {
            expected,
            actual: src.len(),
        });
    }

    let header = Header::new(descriptor.text(), shape.clone(), dtype).to_bytes()?;
    let fits = |payload_len: usize| -> Result<(), VolpipeError> {
        let Some(available) = capacity else {
            return Ok(());
        };
        let required = header
            .len()
            .checked_add(payload_len)
            .ok_or_else(|| VolpipeError::ShapeOverflow("encoded length overflows usize".into()))?;
        if required > available {
            return Err(VolpipeError::DestinationTooSmall { required, available });
        }
        Ok(())
    };
    fits(0)?;

    log::debug!(
        "Encoding {} {} bytes of shape {} through '{}' on {} thread(s)",
        src.len(),
        dtype,
        shape,
        descriptor.text(),
        ctx.threads()
    );

    let mut view = DataView::new(shape.clone(), dtype);
    let mut buffer: Option<Vec<u8>> = None;
    for resolved in descriptor.stages() {
        let input = buffer.as_deref().unwrap_or(src);
        let output = encode_stage(resolved, input, &view, ctx)?;
        fits(output.len())?;
        if resolved.stage.transform() == StreamTransform::ToBytes {
            view = DataView::bytes(output.len())?;
        }
        buffer = Some(output);
    }

    Ok(Encoded {
        header,
        payload: buffer.unwrap_or_else(|| src.to_vec()),
    })
}

/// Encodes `src` into `dst` and returns the number of bytes written.
///
/// # Errors
/// * `InvalidPipeline` / `UnknownStage` if `pipeline` does not resolve.
/// * `BufferMismatch` if `src` is not exactly `shape` elements of `dtype`.
/// * `DestinationTooSmall` if the header or any stage output does not fit.
/// * `StageFailed` if a stage fails or breaks its layout contract.
pub fn encode_into(
    registry: &StageRegistry,
    pipeline: &str,
    src: &[u8],
    shape: &Shape,
    dtype: ElementType,
    dst: &mut [u8],
    nthreads: usize,
) -> Result<usize, VolpipeError> {
    let descriptor = PipelineDescriptor::parse(pipeline, registry)?;
    let ctx = ExecutionContext::new(nthreads, registry)?;
    let encoded = run_encode(&descriptor, src, shape, dtype, Some(dst.len()), &ctx)?;

    let header_len = encoded.header.len();
    let total = encoded.len();
    dst[..header_len].copy_from_slice(&encoded.header);
    dst[header_len..total].copy_from_slice(&encoded.payload);
    Ok(total)
}

/// Encodes `src` into a newly allocated buffer.
pub fn encode(
    registry: &StageRegistry,
    pipeline: &str,
    src: &[u8],
    shape: &Shape,
    dtype: ElementType,
    nthreads: usize,
) -> Result<Vec<u8>, VolpipeError> {
    let descriptor = PipelineDescriptor::parse(pipeline, registry)?;
    let ctx = ExecutionContext::new(nthreads, registry)?;
    let encoded = run_encode(&descriptor, src, shape, dtype, None, &ctx)?;

    let mut out = encoded.header;
    out.extend_from_slice(&encoded.payload);
    Ok(out)
}

//==================================================================================
// 4. Decode
//==================================================================================

/// The view each stage saw during encode, as far as the header describes it.
/// Views are known up to and including the first `ToBytes` stage; after it
/// every entry is `None`.
fn header_targets(descriptor: &PipelineDescriptor, header: &Header) -> Vec<Option<DataView>> {
    let mut view = Some(header.view());
    descriptor
        .stages()
        .iter()
        .map(|resolved| {
            let target = view.clone();
            if resolved.stage.transform() == StreamTransform::ToBytes {
                view = None;
            }
            target
        })
        .collect()
}

/// Completes a missing target at decode time. A layout-preserving stage's
/// output is as long as its input, so its target is a byte view of the input.
/// Anything else stays unknown and must be self-delimiting.
fn resolve_target(
    resolved: &ResolvedStage,
    known: &Option<DataView>,
    input_len: usize,
) -> Result<Option<DataView>, VolpipeError> {
    match known {
        Some(view) => Ok(Some(view.clone())),
        None if resolved.stage.transform() == StreamTransform::PreserveLayout => {
            DataView::bytes(input_len).map(Some)
        }
        None => Ok(None),
    }
}

fn run_decode(
    registry: &StageRegistry,
    src: &[u8],
    capacity: Option<usize>,
    nthreads: usize,
) -> Result<(Header, Vec<u8>), VolpipeError> {
    let header = Header::parse(src)?;
    let descriptor = PipelineDescriptor::parse(header.pipeline(), registry)?;
    let expected = header.decompressed_length()?;

    if let Some(available) = capacity {
        if expected > available {
            return Err(VolpipeError::DestinationTooSmall {
                required: expected,
                available,
            });
        }
    }

    let payload = &src[header.encoded_len()?..];
    let ctx = ExecutionContext::new(nthreads, registry)?;
    let targets = header_targets(&descriptor, &header);
    let limits = estimator::stage_bounds(&descriptor, header.view())?;

    log::debug!(
        "Decoding {} payload bytes through '{}' into {} bytes of shape {} on {} thread(s)",
        payload.len(),
        descriptor.text(),
        expected,
        header.shape(),
        ctx.threads()
    );

    let mut buffer: Option<Vec<u8>> = None;
    let stages = descriptor.stages().iter().zip(&targets).zip(&limits[..descriptor.len()]);
    for ((resolved, known), &limit) in stages.rev() {
        let input = buffer.as_deref().unwrap_or(payload);
        let target = resolve_target(resolved, known, input.len())?;
        buffer = Some(decode_stage(resolved, input, target.as_ref(), limit, &ctx)?);
    }

    let output = buffer.unwrap_or_else(|| payload.to_vec());
    if output.len() != expected {
        return Err(VolpipeError::BufferMismatch {
            expected,
            actual: output.len(),
        });
    }
    Ok((header, output))
}

/// Decodes `src` into `dst` and returns the number of bytes written, which is
/// always the header's decompressed length.
///
/// # Errors
/// * `HeaderParseError` if the header is malformed.
/// * `UnknownStage` if the header names an unregistered stage. No stage runs.
/// * `DestinationTooSmall` if `dst` cannot hold the decompressed volume.
/// * `StageFailed` if a stage decoder fails.
pub fn decode_into(registry: &StageRegistry, src: &[u8], dst: &mut [u8], nthreads: usize) -> Result<usize, VolpipeError> {
    let (_, output) = run_decode(registry, src, Some(dst.len()), nthreads)?;
    dst[..output.len()].copy_from_slice(&output);
    Ok(output.len())
}

/// Decodes `src` into a newly allocated buffer, returning the parsed header with it.
pub fn decode(registry: &StageRegistry, src: &[u8], nthreads: usize) -> Result<(Header, Vec<u8>), VolpipeError> {
    run_decode(registry, src, None, nthreads)
}

//==================================================================================
// 5. Estimation Entry Points
//==================================================================================

/// Size-only worst case for encoding `input_size` bytes of `dtype` through `pipeline`.
pub fn max_compressed_length(
    registry: &StageRegistry,
    pipeline: &str,
    input_size: usize,
    dtype: ElementType,
) -> Result<usize, VolpipeError> {
    let descriptor = PipelineDescriptor::parse(pipeline, registry)?;
    estimator::max_compressed_length(&descriptor, input_size, dtype)
}

/// Shape-aware worst case for encoding a `shape` volume of `dtype` through `pipeline`.
pub fn max_compressed_length_nd(
    registry: &StageRegistry,
    pipeline: &str,
    shape: &Shape,
    dtype: ElementType,
) -> Result<usize, VolpipeError> {
    let descriptor = PipelineDescriptor::parse(pipeline, registry)?;
    estimator::max_compressed_length_nd(&descriptor, shape, dtype)
}
