// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use alloy::{
    primitives::{Address, U256},
    providers::ProviderBuilder,
    rpc::client::RpcClient,
    transports::layers::RetryBackoffLayer,
};
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use holder_rewards::{
    run_distribution, AccrualWindow, ArtifactSink, DistributionArtifact, DistributionConfig,
    DistributionJob, DryRunSink, Erc20PoolBalance, FixedPoolSize, JsonFileSink, MinShare,
    PoolSizeSource, RpcLedger,
};
use url::Url;

/// Arguments of the rewards distributor.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct MainArgs {
    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false, global = true)]
    log_json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a distribution from on-chain transfers and publish its Merkle artifact.
    Run(RunArgs),
    /// Check every proof of a published artifact against its root.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// URL of the Ethereum RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Url,

    /// Token contracts whose holders are rewarded.
    #[clap(long, env, value_delimiter = ',', required = true)]
    instruments: Vec<Address>,

    /// Block to start reading transfers from. Must precede the first transfer of every instrument.
    #[clap(long, env, default_value = "0")]
    from_block: u64,

    /// First block of the accrual window.
    #[clap(long, env)]
    start_block: u64,

    /// Last block of the accrual window. Defaults to the latest block.
    #[clap(long, env)]
    end_block: Option<u64>,

    /// Fixed reward pool size, in the reward token's smallest unit.
    #[clap(long, env, conflicts_with_all = ["reward_token", "distributor"])]
    pool_size: Option<U256>,

    /// Reward token; the pool is the distributor's current balance of it.
    #[clap(long, env, requires = "distributor")]
    reward_token: Option<Address>,

    /// Address holding the reward pool.
    #[clap(long, env, requires = "reward_token")]
    distributor: Option<Address>,

    /// Minimum fraction of the total score a holder must exceed to be paid.
    #[clap(long, env, default_value = "0.001")]
    min_share: MinShare,

    /// Where to write the artifact JSON.
    #[clap(short, long, env, required_unless_present = "dry_run")]
    output: Option<PathBuf>,

    /// Log the artifact instead of writing it.
    #[clap(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Artifact JSON to check.
    artifact: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MainArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    // NOTE: Using a separate `run` function to facilitate testing below.
    match &args.command {
        Command::Run(run_args) => run(run_args).await,
        Command::Verify(verify_args) => verify(verify_args).await,
    }
}

async fn run(args: &RunArgs) -> Result<()> {
    let provider = ProviderBuilder::new().connect_client(
        RpcClient::builder().layer(RetryBackoffLayer::new(3, 1000, 200)).http(args.rpc_url.clone()),
    );

    let pool_source: Box<dyn PoolSizeSource> =
        match (args.pool_size, args.reward_token, args.distributor) {
            (Some(pool_size), None, None) => Box::new(FixedPoolSize(pool_size)),
            (None, Some(token), Some(distributor)) => {
                Box::new(Erc20PoolBalance::new(provider.clone(), token, distributor))
            }
            _ => bail!("Either --pool-size or both --reward-token and --distributor are required"),
        };

    let sink: Box<dyn ArtifactSink> = match (&args.output, args.dry_run) {
        (_, true) => Box::new(DryRunSink),
        (Some(path), false) => Box::new(JsonFileSink::new(path)),
        (None, false) => bail!("--output is required unless --dry-run is set"),
    };

    let job = DistributionJob {
        instruments: args.instruments.clone(),
        from_block: args.from_block,
        config: DistributionConfig::new(AccrualWindow::new(args.start_block, args.end_block))
            .with_min_share(args.min_share),
    };
    tracing::info!(
        "Distributing over {} instruments with minimum share {}",
        job.instruments.len(),
        job.config.min_share
    );

    let ledger = RpcLedger::new(provider);
    let distribution =
        run_distribution(&job, &ledger, &ledger, pool_source.as_ref(), sink.as_ref()).await?;

    tracing::info!(
        "Published root {} for {} holders",
        distribution.artifact.root,
        distribution.artifact.proofs.len()
    );
    Ok(())
}

async fn verify(args: &VerifyArgs) -> Result<()> {
    let artifact = DistributionArtifact::load(&args.artifact).await?;

    let invalid = artifact.invalid_claims();
    if !invalid.is_empty() {
        for address in &invalid {
            tracing::error!("Proof of {} does not reproduce root {}", address, artifact.root);
        }
        bail!("{} of {} claims failed verification", invalid.len(), artifact.proofs.len());
    }

    tracing::info!(
        "All {} claims verify against root {} (total {})",
        artifact.proofs.len(),
        artifact.root,
        artifact.total_amount()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, B256};
    use holder_rewards::{commit_leaves, DistributionLeaf};
    use tracing_test::traced_test;

    use super::*;

    fn artifact() -> DistributionArtifact {
        commit_leaves(&[
            DistributionLeaf {
                address: address!("0x00000000000000000000000000000000000000a1"),
                amount: U256::from(100),
            },
            DistributionLeaf {
                address: address!("0x0000000000000000000000000000000000000b0b"),
                amount: U256::from(200),
            },
        ])
        .unwrap()
    }

    #[test]
    fn parses_run_args() {
        let args = MainArgs::try_parse_from([
            "rewards-distributor",
            "run",
            "--rpc-url",
            "http://localhost:8545",
            "--instruments",
            "0x1111111111111111111111111111111111111111,0x2222222222222222222222222222222222222222",
            "--start-block",
            "100",
            "--pool-size",
            "1000",
            "--min-share",
            "0.01",
            "--dry-run",
        ])
        .unwrap();

        let Command::Run(run_args) = args.command else { panic!("expected run command") };
        assert_eq!(run_args.instruments.len(), 2);
        assert_eq!(run_args.start_block, 100);
        assert_eq!(run_args.end_block, None);
        assert_eq!(run_args.pool_size, Some(U256::from(1000)));
        assert_eq!(run_args.min_share, MinShare::new(1, 100).unwrap());
        assert!(run_args.output.is_none());
    }

    #[test]
    fn rejects_conflicting_pool_sources() {
        let result = MainArgs::try_parse_from([
            "rewards-distributor",
            "run",
            "--rpc-url",
            "http://localhost:8545",
            "--instruments",
            "0x1111111111111111111111111111111111111111",
            "--start-block",
            "0",
            "--pool-size",
            "1000",
            "--reward-token",
            "0x3333333333333333333333333333333333333333",
            "--distributor",
            "0x4444444444444444444444444444444444444444",
            "--output",
            "out.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_invalid_min_share() {
        let result = MainArgs::try_parse_from([
            "rewards-distributor",
            "run",
            "--rpc-url",
            "http://localhost:8545",
            "--instruments",
            "0x1111111111111111111111111111111111111111",
            "--start-block",
            "0",
            "--pool-size",
            "1000",
            "--min-share",
            "1.5",
            "--dry-run",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn verify_accepts_published_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        JsonFileSink::new(&path).publish(&artifact()).await.unwrap();

        verify(&VerifyArgs { artifact: path }).await.unwrap();
        assert!(logs_contain("All 2 claims verify"));
    }

    #[tokio::test]
    #[traced_test]
    async fn verify_rejects_tampered_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.json");
        let mut tampered = artifact();
        tampered.root = B256::repeat_byte(0x42);
        JsonFileSink::new(&path).publish(&tampered).await.unwrap();

        let err = verify(&VerifyArgs { artifact: path }).await.unwrap_err();
        assert!(err.to_string().contains("2 of 2 claims failed verification"));
        assert!(logs_contain("does not reproduce root"));
    }
}
