use clap::Parser;
use geoprivcrypto::{keygen, save_json};

#[derive(Parser, Debug)]
struct Opt {
    /// Output directory
    #[arg(long, default_value = "./keys")]
    out: String,
    /// Modulus size in bits
    #[arg(long, default_value_t = 1024)]
    bits: u32,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    std::fs::create_dir_all(&opt.out)?;
    let (pk, sk) = keygen(opt.bits, &mut rand::rngs::OsRng)?;
    save_json(&format!("{}/paillier_pub.json", opt.out), &pk)?;
    save_json(&format!("{}/paillier_priv.json", opt.out), &sk)?;
    println!("Wrote {}-bit Paillier keys to {}", pk.bits(), opt.out);
    println!("Key id: {}", pk.key_id());
    Ok(())
}
