//! CPU reference backend
//!
//! A portable backend that runs small elementwise f32 programs. Compiled
//! units are JSON documents:
//!
//! ```json
//! {"target": "cpu_ref", "format_version": 1, "num_inputs": 2,
//!  "ops": [{"op": "add", "input": 1}, {"op": "relu"}]}
//! ```
//!
//! Execution starts from input 0 and applies each op in order. The result is
//! written to the slot right after the inputs.

use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::{
    find_spec, BackendOption, CompileSpec, FreeableBuffer, OptionReport, OptionValue, Tensor,
    Value,
};

use super::{BackendInterface, DelegateHandle, ExecutionContext, InitContext, OptionContext};

/// Registry name of the CPU reference backend
pub const CPU_REF_NAME: &str = "cpu_ref";

/// Compiled-unit format version this build understands
pub const CPU_REF_FORMAT_VERSION: u32 = 1;

/// Below this many elements ops run on the calling thread
const PARALLEL_THRESHOLD: usize = 16 * 1024;

// ─────────────────────────────────────────────────────────────────
// Compiled-unit format
// ─────────────────────────────────────────────────────────────────

/// A `cpu_ref` program as stored in a compiled unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuProgram {
    pub target: String,
    pub format_version: u32,
    pub num_inputs: usize,
    pub ops: Vec<Op>,
}

/// One elementwise operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Add input `input`
    Add { input: usize },
    /// Multiply by input `input`
    Mul { input: usize },
    Scale { factor: f32 },
    Relu,
    /// Add a constant tensor from named data
    AddConst { name: String },
}

impl CpuProgram {
    /// Program for the current format version
    pub fn new(num_inputs: usize, ops: Vec<Op>) -> Self {
        Self {
            target: CPU_REF_NAME.to_string(),
            format_version: CPU_REF_FORMAT_VERSION,
            num_inputs,
            ops,
        }
    }

    /// Serialize into compiled-unit bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

/// Just enough of the unit to decide compatibility
#[derive(Deserialize)]
struct ProgramHeader {
    target: String,
    format_version: u32,
}

/// Hex SHA-256 of a compiled unit, as expected by the `sha256` compile spec
pub fn unit_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ─────────────────────────────────────────────────────────────────
// Handle state
// ─────────────────────────────────────────────────────────────────

enum Step {
    Add(usize),
    Mul(usize),
    Scale(f32),
    Relu,
    /// Little-endian f32 bytes held in runtime-allocator memory
    AddConst(Box<[u8]>),
}

struct CompiledProgram {
    num_inputs: usize,
    steps: Vec<Step>,
    /// Thread count fixed by a compile spec
    num_threads: Option<usize>,
}

/// Adjustable settings
#[derive(Debug, Clone)]
struct CpuSettings {
    num_threads: usize,
    profiling: bool,
}

// ─────────────────────────────────────────────────────────────────
// CPU Reference Backend
// ─────────────────────────────────────────────────────────────────

/// Portable reference implementation of BackendInterface
pub struct CpuReferenceBackend {
    settings: RwLock<CpuSettings>,
}

impl CpuReferenceBackend {
    /// Create a backend using every available core
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    /// Create a backend with a fixed default thread count
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            settings: RwLock::new(CpuSettings {
                num_threads: num_threads.max(1),
                profiling: false,
            }),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.settings.read().num_threads
    }

    fn compile(
        &self,
        ctx: &InitContext<'_>,
        bytes: &[u8],
        compile_specs: &[CompileSpec<'_>],
    ) -> Result<CompiledProgram> {
        if let Some(expected) = find_spec(compile_specs, "sha256") {
            let expected = expected
                .as_str()
                .ok_or_else(|| Error::InvalidArgument("sha256 spec is not UTF-8".into()))?;
            let actual = unit_digest(bytes);
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(Error::InvalidProgram(format!(
                    "digest mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
        }

        let header: ProgramHeader = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidProgram(format!("unreadable cpu_ref header: {}", e)))?;
        if header.target != CPU_REF_NAME {
            return Err(Error::incompatible(
                CPU_REF_NAME,
                format!("unit targets '{}'", header.target),
            ));
        }
        if header.format_version != CPU_REF_FORMAT_VERSION {
            return Err(Error::incompatible(
                CPU_REF_NAME,
                format!(
                    "format version {}, expected {}",
                    header.format_version, CPU_REF_FORMAT_VERSION
                ),
            ));
        }

        let program: CpuProgram = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidProgram(format!("malformed cpu_ref program: {}", e)))?;

        let num_threads = match find_spec(compile_specs, "num_threads") {
            Some(raw) => Some(parse_threads(raw.as_str().unwrap_or(""))?),
            None => None,
        };

        if program.num_inputs == 0 {
            return Err(Error::InvalidProgram("program needs at least one input".into()));
        }

        let mut steps = Vec::with_capacity(program.ops.len());
        for op in program.ops {
            let step = match op {
                Op::Add { input } => Step::Add(check_input(input, program.num_inputs)?),
                Op::Mul { input } => Step::Mul(check_input(input, program.num_inputs)?),
                Op::Scale { factor } => Step::Scale(factor),
                Op::Relu => Step::Relu,
                Op::AddConst { name } => Step::AddConst(load_constant(ctx, &name)?),
            };
            steps.push(step);
        }

        Ok(CompiledProgram {
            num_inputs: program.num_inputs,
            steps,
            num_threads,
        })
    }
}

impl Default for CpuReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_threads(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::InvalidArgument(format!(
            "num_threads must be a positive integer, got '{}'",
            raw
        ))),
    }
}

fn check_input(input: usize, num_inputs: usize) -> Result<usize> {
    if input >= num_inputs {
        return Err(Error::InvalidProgram(format!(
            "op references input {} but program has {}",
            input, num_inputs
        )));
    }
    Ok(input)
}

fn load_constant(ctx: &InitContext<'_>, name: &str) -> Result<Box<[u8]>> {
    let named = ctx.named_data().ok_or_else(|| Error::NamedDataNotFound {
        key: name.to_string(),
    })?;
    let bytes = named.get_data(name)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidProgram(format!(
            "constant '{}' is {} bytes, not a whole number of f32",
            name,
            bytes.len()
        )));
    }

    let mut block = ctx
        .runtime_allocator()
        .allocate(bytes.len())
        .map_err(|_| Error::DelegateMemoryAllocationFailed {
            backend: CPU_REF_NAME.to_string(),
            requested: bytes.len(),
        })?;
    block.copy_from_slice(bytes);
    Ok(block)
}

fn input_tensor(args: &[Value], index: usize) -> Result<&Tensor> {
    args.get(index)
        .and_then(Value::as_tensor)
        .ok_or_else(|| Error::InvalidArgument(format!("argument {} is not a tensor", index)))
}

/// Run `f` over `data`, split across up to `threads` scoped threads
fn for_each_chunk<F>(data: &mut [f32], threads: usize, f: F)
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    // Every worker gets at least PARALLEL_THRESHOLD elements
    let workers = threads.min(data.len() / PARALLEL_THRESHOLD).max(1);
    if workers == 1 {
        f(0, data);
        return;
    }

    let chunk = data.len().div_ceil(workers);
    std::thread::scope(|scope| {
        for (i, part) in data.chunks_mut(chunk).enumerate() {
            let f = &f;
            scope.spawn(move || f(i * chunk, part));
        }
    });
}

fn apply(step: &Step, acc: &mut [f32], inputs: &[Value], threads: usize) -> Result<()> {
    match step {
        Step::Add(index) | Step::Mul(index) => {
            let other = input_tensor(inputs, *index)?.data();
            if other.len() != acc.len() {
                return Err(Error::InvalidArgument(format!(
                    "input {} has {} elements, expected {}",
                    index,
                    other.len(),
                    acc.len()
                )));
            }
            let mul = matches!(step, Step::Mul(_));
            for_each_chunk(acc, threads, |offset, part| {
                let rhs = &other[offset..offset + part.len()];
                for (x, y) in part.iter_mut().zip(rhs) {
                    if mul {
                        *x *= *y;
                    } else {
                        *x += *y;
                    }
                }
            });
        }
        Step::Scale(factor) => {
            let factor = *factor;
            for_each_chunk(acc, threads, |_, part| part.iter_mut().for_each(|x| *x *= factor));
        }
        Step::Relu => {
            for_each_chunk(acc, threads, |_, part| part.iter_mut().for_each(|x| *x = x.max(0.0)));
        }
        Step::AddConst(block) => {
            if block.len() != acc.len() * 4 {
                return Err(Error::InvalidArgument(format!(
                    "constant has {} elements, expected {}",
                    block.len() / 4,
                    acc.len()
                )));
            }
            for_each_chunk(acc, threads, |offset, part| {
                let bytes = &block[offset * 4..(offset + part.len()) * 4];
                for (x, c) in part.iter_mut().zip(bytes.chunks_exact(4)) {
                    *x += f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                }
            });
        }
    }
    Ok(())
}

impl BackendInterface for CpuReferenceBackend {
    fn is_available(&self) -> bool {
        true
    }

    fn init(
        &self,
        ctx: &mut InitContext<'_>,
        processed: &mut FreeableBuffer,
        compile_specs: &[CompileSpec<'_>],
    ) -> Result<DelegateHandle> {
        let program = self.compile(ctx, processed.data(), compile_specs)?;

        debug!(
            steps = program.steps.len(),
            inputs = program.num_inputs,
            threads = ?program.num_threads,
            "cpu_ref program compiled"
        );

        // Everything needed lives in the handle now
        processed.free();
        Ok(DelegateHandle::new(program))
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        handle: &DelegateHandle,
        args: &mut [Value],
    ) -> Result<()> {
        let program = handle.state::<CompiledProgram>(CPU_REF_NAME)?;
        let settings = self.settings.read().clone();
        let threads = program.num_threads.unwrap_or(settings.num_threads);

        let out_index = program.num_inputs;
        if args.len() <= out_index {
            return Err(Error::InvalidArgument(format!(
                "expected {} inputs and 1 output, got {} arguments",
                program.num_inputs,
                args.len()
            )));
        }

        let started = Instant::now();
        let (inputs, outputs) = args.split_at_mut(out_index);
        let first = input_tensor(inputs, 0)?;

        // Results are computed in the output tensor, reusing its storage
        let slot = &mut outputs[0];
        if slot.is_none() {
            *slot = Value::Tensor(Tensor::zeros(first.sizes().to_vec()));
        }
        let type_name = slot.type_name();
        let out = slot.as_tensor_mut().ok_or_else(|| {
            Error::InvalidArgument(format!("output slot holds {}, expected tensor", type_name))
        })?;
        out.resize(first.sizes());
        out.data_mut().copy_from_slice(first.data());

        for step in &program.steps {
            apply(step, out.data_mut(), inputs, threads)?;
        }

        if settings.profiling {
            debug!(
                handle = %handle.id(),
                elapsed_us = started.elapsed().as_micros() as u64,
                threads,
                "cpu_ref execute"
            );
        } else {
            trace!(handle = %handle.id(), "cpu_ref execute");
        }
        Ok(())
    }

    fn set_option(&self, _ctx: &mut OptionContext, options: &[BackendOption]) -> Result<()> {
        let mut report = OptionReport::new();
        let mut settings = self.settings.write();

        for option in options {
            match (option.key.as_str(), &option.value) {
                ("num_threads", OptionValue::Int(n)) if *n >= 1 => {
                    settings.num_threads = *n as usize;
                }
                ("profiling", OptionValue::Bool(b)) => settings.profiling = *b,
                _ => report.reject(&option.key),
            }
        }

        debug!(
            num_threads = settings.num_threads,
            profiling = settings.profiling,
            rejected = report.rejected().len(),
            "cpu_ref options updated"
        );
        report.into_result(CPU_REF_NAME)
    }

    fn get_option(&self, _ctx: &mut OptionContext, options: &mut [BackendOption]) -> Result<()> {
        let mut report = OptionReport::new();
        let settings = self.settings.read();

        for option in options.iter_mut() {
            option.value = match option.key.as_str() {
                "num_threads" => OptionValue::Int(settings.num_threads as i64),
                "profiling" => OptionValue::Bool(settings.profiling),
                "version" | "format_version" => OptionValue::Int(i64::from(CPU_REF_FORMAT_VERSION)),
                _ => {
                    report.reject(&option.key);
                    continue;
                }
            };
        }
        report.into_result(CPU_REF_NAME)
    }

    fn destroy(&self, handle: DelegateHandle) {
        let id = handle.id();
        match handle.into_state::<CompiledProgram>() {
            Ok(program) => debug!(handle = %id, steps = program.steps.len(), "cpu_ref handle released"),
            Err(_) => tracing::warn!(handle = %id, "cpu_ref asked to destroy a foreign handle"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
