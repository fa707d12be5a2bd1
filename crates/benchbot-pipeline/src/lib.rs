//! Benchmark pipeline: static subcommand/pallet registry, command
//! validation and templating, the sequential run pipeline, and the `bench`
//! command handler registered with the dispatcher.

pub mod benchmark_command;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use benchmark_command::{BenchmarkCommand, BenchmarkCommandConfig};
pub use error::BenchError;
pub use pipeline::{run_benchmark, BenchRunOutcome, BenchRunRequest};
pub use registry::{BenchSubcommand, BenchmarkSpec, Pallet, PalletDescriptor};
