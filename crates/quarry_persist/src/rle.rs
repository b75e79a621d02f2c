use quarry_shared::block::BlockType;

/// Longest run a single `(type, count)` pair can describe.
pub const MAX_RUN_LENGTH: usize = u8::MAX as usize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RleError {
    #[error("run-length stream has odd length {0}")]
    OddLength(usize),
    #[error("run-length stream expands to {actual} blocks, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
}

/// Encodes block types as `(type, count)` byte pairs. Runs longer than
/// `MAX_RUN_LENGTH` are split.
pub fn encode(block_types: &[BlockType]) -> Vec<u8> {
    let bytes: &[u8] = bytemuck::cast_slice(block_types);
    let mut encoded = Vec::with_capacity(64);

    let Some((&first, rest)) = bytes.split_first() else {
        return encoded;
    };

    let mut current = first;
    let mut count = 1usize;
    for &byte in rest {
        if byte == current && count < MAX_RUN_LENGTH {
            count += 1;
            continue;
        }
        encoded.push(current);
        encoded.push(count as u8);
        current = byte;
        count = 1;
    }
    encoded.push(current);
    encoded.push(count as u8);

    encoded
}

/// Expands an encoded stream of any length.
pub fn decode(encoded: &[u8]) -> Result<Vec<BlockType>, RleError> {
    if encoded.len() % 2 != 0 {
        return Err(RleError::OddLength(encoded.len()));
    }

    let mut decoded = Vec::new();
    for pair in encoded.chunks_exact(2) {
        let block_type = BlockType(pair[0]);
        decoded.extend(std::iter::repeat(block_type).take(usize::from(pair[1])));
    }
    Ok(decoded)
}

/// Expands an encoded stream into `out`, which it must fill exactly.
pub fn decode_into(encoded: &[u8], out: &mut [BlockType]) -> Result<(), RleError> {
    if encoded.len() % 2 != 0 {
        return Err(RleError::OddLength(encoded.len()));
    }

    let expected = out.len();
    let actual: usize = encoded.chunks_exact(2).map(|pair| usize::from(pair[1])).sum();
    if actual != expected {
        return Err(RleError::WrongLength { expected, actual });
    }

    let mut cursor = 0;
    for pair in encoded.chunks_exact(2) {
        let count = usize::from(pair[1]);
        out[cursor..cursor + count].fill(BlockType(pair[0]));
        cursor += count;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use quarry_shared::block::BlockType;
    use quarry_shared::chunk::ChunkProxy;
    use quarry_shared::coords::{ChunkPos, CHUNK_VOLUME};
    use quarry_shared::worldgen::WorldGenerator;

    use super::{decode, decode_into, encode, RleError, MAX_RUN_LENGTH};

    #[test]
    fn generated_chunk_round_trips() {
        let mut proxy = ChunkProxy::new(ChunkPos::new(-5, 9));
        WorldGenerator::new(99).populate(&mut proxy);

        let encoded = encode(proxy.as_slice());
        assert_eq!(encoded.len() % 2, 0);
        assert!(encoded.len() < CHUNK_VOLUME);

        let mut decoded = ChunkProxy::new(proxy.coords);
        decode_into(&encoded, decoded.as_mut_slice()).expect("decode chunk");
        assert_eq!(decoded.as_slice(), proxy.as_slice());
    }

    #[test]
    fn long_runs_split_at_cap() {
        let input = vec![BlockType::STONE; MAX_RUN_LENGTH * 2 + 3];
        let encoded = encode(&input);
        assert_eq!(encoded, vec![3, 255, 3, 255, 3, 3]);
        assert_eq!(decode(&encoded).expect("decode"), input);
    }

    #[test]
    fn alternating_types_emit_one_pair_each() {
        let input = vec![
            BlockType::AIR,
            BlockType::DIRT,
            BlockType::AIR,
            BlockType::DIRT,
            BlockType::DIRT,
        ];
        let encoded = encode(&input);
        assert_eq!(encoded, vec![0, 1, 2, 1, 0, 1, 2, 2]);
        assert_eq!(decode(&encoded).expect("decode"), input);
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).expect("decode").is_empty());
    }

    #[test]
    fn corrupt_streams_are_rejected() {
        let mut out = vec![BlockType::AIR; 4];
        assert_eq!(decode(&[1, 2, 3]), Err(RleError::OddLength(3)));
        assert_eq!(
            decode_into(&[1, 3], &mut out),
            Err(RleError::WrongLength {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            decode_into(&[1, 200, 2, 200], &mut out),
            Err(RleError::WrongLength {
                expected: 4,
                actual: 400
            })
        );
        assert!(out.iter().all(|&t| t == BlockType::AIR));
    }
}
