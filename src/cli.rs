//! # Crossway CLI

use crate::{
    config::AccessConfig,
    fees::{FeeResolver, Route},
    registry::SessionRegistry,
    session::FeeEstimate,
};
use alloy::{
    primitives::{utils::format_units, Address, U256},
    signers::local::PrivateKeySigner,
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Chain-access tooling for the Crossway swap/bridge toolkit.
#[derive(Debug, Parser)]
#[command(author, about = "Crossway", long_about = None)]
pub struct Args {
    /// The configuration file.
    #[arg(long, value_name = "CONFIG", env = "CROSSWAY_CONFIG", default_value = "crossway.yaml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve the effective fees of a route.
    Fees {
        /// Asset symbol, e.g. USDT.
        #[arg(long)]
        symbol: String,
        /// Logical name of the source chain.
        #[arg(long = "from-chain", value_name = "CHAIN")]
        from_chain: String,
        /// Logical name of the destination chain.
        #[arg(long = "to-chain", value_name = "CHAIN")]
        to_chain: String,
        /// Token-pair id, when known.
        #[arg(long = "pair-id", value_name = "ID")]
        pair_id: Option<u64>,
    },
    /// Inspect a chain session: endpoint, balance, nonce and fee data.
    Diagnose {
        /// Logical name of the chain.
        #[arg(long, value_name = "CHAIN")]
        chain: String,
        /// Secret key to bind to the session.
        #[arg(long, value_name = "SECRET_KEY", env = "CROSSWAY_SK")]
        key: Option<String>,
        /// Address to inspect; defaults to the bound credential's address.
        #[arg(long, value_name = "ADDRESS")]
        address: Option<Address>,
    },
}

impl Args {
    /// Run the selected command.
    pub async fn run(self) -> eyre::Result<()> {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();

        let config = AccessConfig::load_from_file(&self.config)?;
        let registry = Arc::new(SessionRegistry::new(config));

        match self.command {
            Command::Fees { symbol, from_chain, to_chain, pair_id } => {
                let from = registry.config().chain(&from_chain)?.slip44;
                let to = registry.config().chain(&to_chain)?.slip44;
                let mut route = Route::new(symbol.clone(), from, to);
                if let Some(id) = pair_id {
                    route = route.with_pair_id(id);
                }

                let resolver = FeeResolver::new(registry);
                let fees = resolver.resolve_fees(&route).await?;

                println!("{symbol} {from_chain} ({from}) -> {to_chain} ({to})");
                print_service_fee("service fee", fees.service_fee.as_ref());
                print_service_fee("reverse service fee", fees.reverse_service_fee.as_ref());
                match fees.network_fee {
                    Some(fee) => println!("network fee:         {fee}"),
                    None => println!("network fee:         not configured"),
                }
            }
            Command::Diagnose { chain, key, address } => {
                let session = registry.get_or_create(&chain).await?;
                if let Some(key) = key {
                    session.set_credential(key.parse::<PrivateKeySigner>()?).await;
                }
                let address = match address {
                    Some(address) => address,
                    None => match session.signer_address().await {
                        Some(address) => address,
                        None => eyre::bail!("provide --key or --address"),
                    },
                };

                println!("chain:    {} (id {})", session.name(), session.chain_id());
                println!("endpoint: {}", session.current_endpoint().await);
                println!("address:  {address}");
                println!("balance:  {} native", format_units(session.balance(address).await?, "ether")?);
                println!("nonce:    {}", session.nonce(address).await?);
                match session.fee_estimate().await? {
                    FeeEstimate::Dynamic(estimate) => println!(
                        "fees:     max {} gwei, priority {} gwei",
                        format_units(U256::from(estimate.max_fee_per_gas), "gwei")?,
                        format_units(U256::from(estimate.max_priority_fee_per_gas), "gwei")?,
                    ),
                    FeeEstimate::Legacy(price) => {
                        println!("fees:     gas price {} gwei", format_units(U256::from(price), "gwei")?)
                    }
                }
            }
        }

        Ok(())
    }
}

fn print_service_fee(label: &str, fee: Option<&crate::types::AgentFee>) {
    match fee {
        Some(fee) => println!(
            "{label}: {}/{} fixed {} bounds [{}, {}]",
            fee.numerator, fee.denominator, fee.fixed_fee, fee.min_fee_limit, fee.max_fee_limit
        ),
        None => println!("{label}: not configured"),
    }
}
