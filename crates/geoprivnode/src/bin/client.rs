// geoprivnode/src/bin/client.rs
// Coordinate holder:
// - generate or load a Paillier keypair
// - encrypt each point, query the evaluator for both fence shapes
// - decrypt and print one verdict per query; a failed query is reported
//   and the run continues

use anyhow::{anyhow, Result};
use clap::Parser;
use geoprivalgo::fixtures::{DemoPoint, DEMO_POINTS};
use geoprivalgo::{GeoPoint, GeofenceClient, ProtocolConfig, Shape};
use geoprivcrypto::{keygen, load_json, PaillierPrivateKey, PaillierPublicKey};
use geoprivnode::{init_tracing, HttpEvaluator, DEFAULT_SERVER};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Parser)]
struct Opt {
    /// Evaluator base URL
    #[arg(long, env = "GEOPRIV_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Modulus size when generating a fresh keypair
    #[arg(long, default_value_t = 1024)]
    key_bits: u32,

    /// Optional: load the Paillier public key instead of generating
    #[arg(long, requires = "paillier_priv")]
    paillier_pub: Option<String>,

    /// Optional: load the Paillier private key instead of generating
    #[arg(long, requires = "paillier_pub")]
    paillier_priv: Option<String>,

    /// Single point to test; without it the four demo points run
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    #[arg(long, env = "GEOPRIV_LOG", default_value = "info")]
    log_level: String,
}

fn load_keys(opt: &Opt) -> Result<(PaillierPublicKey, PaillierPrivateKey)> {
    match (&opt.paillier_pub, &opt.paillier_priv) {
        (Some(pub_path), Some(priv_path)) => Ok((load_json(pub_path)?, load_json(priv_path)?)),
        (None, None) => Ok(keygen(opt.key_bits, &mut OsRng)?),
        _ => Err(anyhow!(
            "must provide both --paillier-pub and --paillier-priv, or neither to generate new keys"
        )),
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    init_tracing(&opt.log_level);

    let (pk, sk) = load_keys(&opt)?;
    let evaluator = HttpEvaluator::new(&opt.server, Duration::from_secs(opt.timeout_secs))?;
    let mut client = GeofenceClient::new(pk, sk, ProtocolConfig::default(), evaluator)?;

    let pk = client.public_key();
    let pk_json = serde_json::to_vec(pk)?;
    tracing::info!(
        key = %pk.key_id(),
        pk_sha256 = %hex::encode(Sha256::digest(&pk_json)),
        bits = pk.bits(),
        "session key ready"
    );

    let points: Vec<DemoPoint> = match (opt.lat, opt.lng) {
        (Some(lat), Some(lng)) => vec![DemoPoint {
            label: "point",
            point: GeoPoint::new(lat, lng),
        }],
        _ => DEMO_POINTS.to_vec(),
    };

    let mut failures = 0usize;
    for demo in &points {
        println!("testing {} {}", demo.label, demo.point);
        for shape in Shape::ALL {
            match client.check(shape, demo.point) {
                Ok(verdict) => println!("  {shape}: {verdict}"),
                Err(e) => {
                    failures += 1;
                    tracing::error!(%shape, label = demo.label, error = %e, "query failed");
                    println!("  {shape}: error: {e}");
                }
            }
        }
    }
    if failures > 0 {
        tracing::warn!(failures, "some queries failed");
    }
    Ok(())
}
