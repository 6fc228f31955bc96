use anyhow::bail;
use clap::Parser;
use geoprivcrypto::{dec, enc, load_json, PaillierPrivateKey, PaillierPublicKey};
use rug::Integer;
use sha2::{Digest, Sha256};

#[derive(Parser, Debug)]
struct Opt {
    #[arg(long)]
    paillier_pub: String,
    #[arg(long)]
    paillier_priv: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    let pk: PaillierPublicKey = load_json(&opt.paillier_pub)?;
    println!("Public key id:     {}", pk.key_id());
    println!("Public key sha256: {}", hex::encode(Sha256::digest(serde_json::to_vec(&pk)?)));
    println!("Modulus bits:      {}", pk.bits());

    if let Some(sk_path) = &opt.paillier_priv {
        let sk: PaillierPrivateKey = load_json(sk_path)?;
        if sk.key_id() != pk.key_id() {
            bail!("private key {} does not belong to public key {}", sk.key_id(), pk.key_id());
        }
        let sample = Integer::from(0x5eed_u32);
        let c = enc(&pk, &sample, &mut rand::thread_rng())?;
        if dec(&sk, &c)? != sample {
            bail!("encrypt/decrypt round trip failed; key files are inconsistent");
        }
        println!("Private key matches and decrypts correctly.");
    }
    Ok(())
}
