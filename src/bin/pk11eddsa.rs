use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, info};

use pk11eddsa::{
    adapters::{Pkcs11Pool, SoftToken, TextKeyFile},
    api::{Algorithm, EddsaKey, Pin},
    ports::SessionPool,
    EddsaProvider, HsmConfig,
};

#[derive(Parser, Debug)]
#[command(name = "pk11eddsa")]
#[command(about = "EdDSA DNSSEC keys on PKCS#11 tokens", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(flatten)]
    pub hsm: HsmArgs,

    /// DNSSEC algorithm of the key
    #[arg(long, global = true, default_value = "ed25519")]
    pub algorithm: AlgorithmArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct HsmArgs {
    /// PKCS#11 module path. Overrides PK11EDDSA_MODULE; without either an
    /// in-process software token is used
    #[arg(long, global = true)]
    pub module: Option<PathBuf>,

    /// User PIN. Overrides PK11EDDSA_PIN
    #[arg(long, global = true)]
    pub pin: Option<String>,

    /// Preferred token label. Overrides PK11EDDSA_TOKEN
    #[arg(long, global = true)]
    pub token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a key pair, write its private-key file and print the public key as hex
    Generate {
        /// Private-key file to create
        #[arg(long)]
        out: PathBuf,
    },

    /// Sign data provided via stdin, print the signature as hex
    Sign {
        /// Private-key file of the signing key
        #[arg(long)]
        key_file: PathBuf,

        /// Public key (DNSKEY wire form) in hex
        #[arg(long)]
        public: String,
    },

    /// Verify a hex signature over data provided via stdin
    Verify {
        /// Public key (DNSKEY wire form) in hex
        #[arg(long)]
        public: String,

        /// Signature in hex
        #[arg(long)]
        signature: String,
    },

    /// Print the public key of a token-resident key as hex
    Dnskey {
        /// pkcs11: URI naming the key, e.g. pkcs11:token=dnssec;object=ksk
        #[arg(long)]
        label: String,
    },

    /// Write a private-key file referring to a token-resident key
    Export {
        /// pkcs11: URI naming the key
        #[arg(long)]
        label: String,

        /// Engine name recorded next to the label
        #[arg(long)]
        engine: Option<String>,

        /// Private-key file to create
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AlgorithmArg {
    Ed25519,
    Ed448,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Ed25519 => Algorithm::Ed25519,
            AlgorithmArg::Ed448 => Algorithm::Ed448,
        }
    }
}

fn hsm_config(args: HsmArgs) -> anyhow::Result<HsmConfig> {
    let mut config = HsmConfig::from_env().context("invalid HSM environment")?;
    if let Some(module) = args.module {
        config = config.with_module(module);
    }
    if let Some(pin) = args.pin {
        config = config.with_pin(Pin::new(pin).context("invalid --pin")?);
    }
    if let Some(token) = args.token {
        config = config.with_token(token);
    }
    Ok(config)
}

fn read_stdin() -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    io::stdin()
        .read_to_end(&mut data)
        .context("failed to read stdin")?;
    Ok(data)
}

fn public_key<P: SessionPool>(
    provider: &EddsaProvider<P>,
    algorithm: Algorithm,
    public_hex: &str,
) -> anyhow::Result<EddsaKey> {
    let wire = hex::decode(public_hex.trim())
        .map_err(|e| anyhow::anyhow!("Invalid public key hex: {}", e))?;
    provider
        .public_from_dns(algorithm, &wire)
        .context("invalid public key")
}

fn run<P: SessionPool>(
    provider: &EddsaProvider<P>,
    algorithm: Algorithm,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Generate { out } => {
            let key = provider
                .generate(algorithm)
                .context("failed to generate key")?;
            provider
                .write_private_file(&mut TextKeyFile::new(&out), &key)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!("Wrote private key to {}", out.display());
            println!("{}", hex::encode(provider.to_dns(&key)?));
        }

        Commands::Sign { key_file, public } => {
            let mut public = public_key(provider, algorithm, &public)?;
            let mut key = EddsaKey::new(algorithm);
            provider
                .read_private_file(&mut TextKeyFile::new(&key_file), &mut key, &mut public)
                .with_context(|| format!("failed to load {}", key_file.display()))?;

            let data = read_stdin()?;
            let signature = provider.sign(&key, &data).context("failed to sign")?;
            println!("{}", hex::encode(signature));
        }

        Commands::Verify { public, signature } => {
            let key = public_key(provider, algorithm, &public)?;
            let signature = hex::decode(signature.trim())
                .map_err(|e| anyhow::anyhow!("Invalid signature hex: {}", e))?;

            let data = read_stdin()?;
            provider
                .verify(&key, &data, &signature)
                .context("signature does not verify")?;
            println!("OK");
        }

        Commands::Dnskey { label } => {
            let key = provider
                .from_label(algorithm, None, &label)
                .with_context(|| format!("failed to load {}", label))?;
            println!("{}", hex::encode(provider.to_dns(&key)?));
        }

        Commands::Export { label, engine, out } => {
            let key = provider
                .from_label(algorithm, engine.as_deref(), &label)
                .with_context(|| format!("failed to load {}", label))?;
            provider
                .write_private_file(&mut TextKeyFile::new(&out), &key)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!("Wrote private key reference to {}", out.display());
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(io::stderr)
        .init();

    let algorithm = Algorithm::from(cli.algorithm);
    let config = hsm_config(cli.hsm)?;
    match config.module {
        Some(_) => {
            let pool = Pkcs11Pool::open(&config).context("failed to open PKCS#11 module")?;
            run(&EddsaProvider::new(pool), algorithm, cli.command)
        }
        None => {
            debug!("No PKCS#11 module configured, using the software token");
            run(&EddsaProvider::new(SoftToken::new()), algorithm, cli.command)
        }
    }
}
