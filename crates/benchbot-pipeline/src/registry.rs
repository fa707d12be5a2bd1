//! Static registries for benchmark subcommands and pallets.
//!
//! Both are closed enums resolved through total functions, so the set of
//! accepted keywords is compiler-checked; unmatched input default-fails.

/// Flags the rendered runtime benchmark command must literally contain.
pub const REQUIRED_RUNTIME_FLAGS: &[&str] = &[
    "benchmark",
    "--pallet",
    "--extrinsic",
    "--execution",
    "--wasm-execution",
    "--steps",
    "--repeat",
    "--chain",
];

const PALLET_COMMAND_TEMPLATE: &str = "cargo run --release --bin moonbeam \
     --features=runtime-benchmarks -- benchmark pallet --chain=dev --steps=50 \
     --repeat=20 --pallet={pallet_name} --extrinsic=\"*\" --execution=wasm \
     --wasm-execution=compiled --heap-pages=4096 \
     --template=./benchmarking/frame-weight-template.hbs \
     --output=./pallets/{pallet_folder}/src/weights.rs";

/// One statically registered benchmark subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkSpec {
    pub title: &'static str,
    pub command_template: &'static str,
    pub required_flags: &'static [&'static str],
}

const PALLET_SPEC: BenchmarkSpec = BenchmarkSpec {
    title: "Runtime Pallet",
    command_template: PALLET_COMMAND_TEMPLATE,
    required_flags: REQUIRED_RUNTIME_FLAGS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `BenchSubcommand` values.
pub enum BenchSubcommand {
    Pallet,
}

impl BenchSubcommand {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "pallet" => Some(Self::Pallet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pallet => "pallet",
        }
    }

    pub fn spec(self) -> &'static BenchmarkSpec {
        match self {
            Self::Pallet => &PALLET_SPEC,
        }
    }
}

/// Resolved naming facts for one pallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PalletDescriptor {
    pub name: &'static str,
    pub benchmark: &'static str,
    pub dir: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `Pallet` values.
///
/// Moonbeam's pallet naming is inconsistent (the `pallet_` prefix comes and
/// goes, and benchmark identifiers do not always match directory names); this
/// registry absorbs all of it so the pipeline never branches on pallet
/// identity.
pub enum Pallet {
    CrowdloanRewards,
    ParachainStaking,
    AuthorMapping,
    AssetManager,
}

impl Pallet {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "crowdloan-rewards" => Some(Self::CrowdloanRewards),
            "parachain-staking" => Some(Self::ParachainStaking),
            "author-mapping" => Some(Self::AuthorMapping),
            "asset-manager" => Some(Self::AssetManager),
            _ => None,
        }
    }

    pub fn descriptor(self) -> PalletDescriptor {
        match self {
            Self::CrowdloanRewards => PalletDescriptor {
                name: "crowdloan-rewards",
                benchmark: "pallet_crowdloan_rewards",
                dir: "crowdloan-rewards",
            },
            Self::ParachainStaking => PalletDescriptor {
                name: "parachain-staking",
                benchmark: "parachain_staking",
                dir: "parachain-staking",
            },
            Self::AuthorMapping => PalletDescriptor {
                name: "author-mapping",
                benchmark: "pallet_author_mapping",
                dir: "author-mapping",
            },
            Self::AssetManager => PalletDescriptor {
                name: "asset-manager",
                benchmark: "pallet_asset_manager",
                dir: "asset-manager",
            },
        }
    }
}

/// Narrow allow-list blocking shell metacharacter injection: letters, spaces,
/// and hyphens only. Not general input validation.
pub fn command_syntax_is_safe(text: &str) -> bool {
    text.bytes()
        .all(|byte| byte.is_ascii_alphabetic() || byte == b' ' || byte == b'-')
}

/// Reports every required flag literal absent from the rendered command.
pub fn missing_required_flags(
    rendered_command: &str,
    required_flags: &[&'static str],
) -> Vec<&'static str> {
    required_flags
        .iter()
        .copied()
        .filter(|flag| !rendered_command.contains(flag))
        .collect()
}

/// Substitutes the pallet's naming facts into the spec's command template.
pub fn render_bench_command(spec: &BenchmarkSpec, pallet: Pallet) -> String {
    let descriptor = pallet.descriptor();
    spec.command_template
        .replace("{pallet_name}", descriptor.benchmark)
        .replace("{pallet_folder}", descriptor.dir)
}
