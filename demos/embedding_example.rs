//! Example showing how to compute and compare image embeddings
//!
//! ```text
//! cargo run --example embedding_example --features embeddings -- resnet18.ot a.jpg b.jpg
//! ```

use anyhow::{bail, Result};
use ndarray::Array2;
use visual_matcher::{embed_image_file, init, Architecture, Embedder, Ranker, ResNetEmbedder};

fn main() -> Result<()> {
    init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: embedding_example <weights.ot> <query image> <candidate image>...");
    }

    let model = ResNetEmbedder::load(Architecture::Resnet18, &args[0])?;

    let query = embed_image_file(&model, &args[1])?;
    let mut rows = Vec::new();
    for path in &args[2..] {
        rows.extend(embed_image_file(&model, path)?.iter().copied());
    }
    let candidates = Array2::from_shape_vec((args.len() - 2, model.dimension()), rows)?;

    let ranker = Ranker::new(candidates);
    for hit in ranker.rank(query.view(), args.len())? {
        println!("{:>6.2}%  {}", hit.score * 100.0, args[2 + hit.index]);
    }

    Ok(())
}
