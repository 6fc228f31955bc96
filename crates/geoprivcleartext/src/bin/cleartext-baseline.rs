use anyhow::{anyhow, Result};
use clap::Parser;
use geoprivalgo::normalize::{denormalize, normalize_point};
use geoprivalgo::{classify_axis_aligned, classify_rotated, Axis, FenceSet, GeoPoint, ProtocolConfig};

/// Plaintext verdicts for a list of points, for comparison with the
/// encrypted client's output.
#[derive(Parser)]
struct Opt {
    /// Points file, one `lat lng` pair per line
    points: String,
    /// Fence JSON; defaults to the Colorado fences
    #[arg(long)]
    fence: Option<String>,
}

fn read_points(path: &str) -> Result<Vec<GeoPoint>> {
    let txt = std::fs::read_to_string(path)?;
    let mut pts = vec![];
    for (no, line) in txt.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut it = line.split_whitespace();
        let (Some(lat), Some(lng)) = (it.next(), it.next()) else {
            return Err(anyhow!("{path}:{}: expected `lat lng`", no + 1));
        };
        pts.push(GeoPoint::new(lat.parse()?, lng.parse()?));
    }
    Ok(pts)
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let fences = match &opt.fence {
        Some(path) => FenceSet::load(path)?,
        None => FenceSet::colorado(),
    };
    let cfg = ProtocolConfig::default();

    for p in read_points(&opt.points)? {
        let aligned = fences
            .plain_distances(p, &cfg)
            .map(|d| classify_axis_aligned(&d).to_string());
        let rotated = fences
            .plain_projections(p, &cfg)
            .map(|r| classify_rotated(&r).to_string());
        match (aligned, rotated) {
            (Ok(a), Ok(r)) => {
                // the grid point the encrypted client actually sends
                let (lat, lng) = normalize_point(p, &cfg)?;
                let snapped = GeoPoint::new(
                    denormalize(Axis::Latitude, lat, &cfg),
                    denormalize(Axis::Longitude, lng, &cfg),
                );
                println!("{p} -> {snapped} aligned: {a}; rotated: {r}");
            }
            (Err(e), _) | (_, Err(e)) => println!("{p} error: {e}"),
        }
    }
    Ok(())
}
