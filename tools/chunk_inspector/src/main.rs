use std::env;
use std::fs;
use std::path::Path;

use quarry_persist::chunk_store::{parse_chunk_file_name, ChunkStore};
use quarry_persist::rle;
use quarry_shared::block::{BlockRegistry, BlockType};
use quarry_shared::coords::{local_to_index, LocalPos, CHUNK_HEIGHT, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_VOLUME};

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: chunk_inspector <path/to/chunk.X.Y.rle | path/to/world>");
        std::process::exit(2);
    };

    if let Err(err) = run(Path::new(&path)) {
        eprintln!("chunk_inspector error: {err}");
        std::process::exit(1);
    }
}

fn run(path: &Path) -> Result<(), String> {
    if path.is_dir() {
        list_world(path)
    } else {
        inspect_chunk(path)
    }
}

fn list_world(path: &Path) -> Result<(), String> {
    let store = ChunkStore::open(path)
        .map_err(|err| format!("failed to open {}: {err}", path.display()))?;
    let positions = store
        .chunk_positions()
        .map_err(|err| format!("failed to list {}: {err}", path.display()))?;

    println!("World: {}", path.display());
    println!("Saved chunks: {}", positions.len());
    for pos in positions {
        println!("  chunk @ ({}, {})", pos.x, pos.y);
    }
    Ok(())
}

fn inspect_chunk(path: &Path) -> Result<(), String> {
    let bytes = fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let blocks = rle::decode(&bytes).map_err(|err| format!("failed to decode {}: {err}", path.display()))?;
    if blocks.len() != CHUNK_VOLUME {
        return Err(format!(
            "{} decodes to {} blocks, expected {CHUNK_VOLUME}",
            path.display(),
            blocks.len()
        ));
    }

    let registry = BlockRegistry::default();
    println!("Chunk file: {}", path.display());
    if let Some(pos) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_chunk_file_name)
    {
        println!("Coordinates: ({}, {})", pos.x, pos.y);
    }
    println!(
        "Encoded size: {} bytes ({:.1}x compression)",
        bytes.len(),
        CHUNK_VOLUME as f64 / bytes.len().max(1) as f64
    );

    let mut counts = [0usize; 256];
    for block_type in &blocks {
        counts[block_type.0 as usize] += 1;
    }
    println!("Blocks:");
    for (value, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let block_type = BlockType(value as u8);
        let name = registry.get(block_type).map_or("<unknown>", |d| d.name);
        println!("  {name:<12} {count:>6}");
    }

    let heights: Vec<usize> = (0..CHUNK_SIZE_Y)
        .flat_map(|y| (0..CHUNK_SIZE_X).map(move |x| (x, y)))
        .map(|(x, y)| column_height(&registry, &blocks, x, y))
        .collect();
    let lowest = heights.iter().copied().min().unwrap_or(0);
    let highest = heights.iter().copied().max().unwrap_or(0);
    let mean = heights.iter().sum::<usize>() as f64 / heights.len().max(1) as f64;
    println!("Column heights: min {lowest}, max {highest}, mean {mean:.1}");

    Ok(())
}

fn column_height(registry: &BlockRegistry, blocks: &[BlockType], x: usize, y: usize) -> usize {
    (0..CHUNK_HEIGHT)
        .rev()
        .find(|&z| {
            let index = local_to_index(LocalPos::new(x as u8, y as u8, z as u8));
            registry.is_solid(blocks[index])
        })
        .unwrap_or(0)
}
