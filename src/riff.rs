//! RIFF-style chunk container parsing.
//!
//! Cartridges are a tree of tagged chunks: `tag[4] size:u32le payload`,
//! padded to even offsets. `RIFF` and `LIST` chunks are containers whose
//! payload starts with a 4-byte form type followed by child chunks; every
//! other tag is a leaf carrying an opaque payload.

use std::fmt;

pub const CONTAINER_RIFF: [u8; 4] = *b"RIFF";
pub const CONTAINER_LIST: [u8; 4] = *b"LIST";

/// Deepest container nesting accepted. Real cartridges are a few levels;
/// the cap also bounds the recursive walk and drop of the parsed tree.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Container {
        tag: [u8; 4],
        form: [u8; 4],
        children: Vec<Chunk>,
    },
    Leaf {
        tag: [u8; 4],
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Fewer than 8 bytes remained where a chunk header was expected.
    TruncatedHeader { offset: usize },
    /// A chunk declared more payload than the buffer holds.
    TruncatedPayload { offset: usize, declared: u32 },
    /// A container chunk too small to hold its form type.
    ShortContainer { offset: usize },
    /// Containers nested beyond `MAX_NESTING` levels.
    TooDeep { offset: usize },
    /// The buffer holds no chunks at all.
    Empty,
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::TruncatedHeader { offset } => {
                write!(f, "truncated chunk header at offset {}", offset)
            }
            ChunkError::TruncatedPayload { offset, declared } => {
                write!(
                    f,
                    "chunk at offset {} declares {} payload bytes past the end of the buffer",
                    offset, declared
                )
            }
            ChunkError::ShortContainer { offset } => {
                write!(f, "container chunk at offset {} has no form type", offset)
            }
            ChunkError::TooDeep { offset } => {
                write!(
                    f,
                    "container chunk at offset {} nests deeper than {} levels",
                    offset, MAX_NESTING
                )
            }
            ChunkError::Empty => write!(f, "empty chunk buffer"),
        }
    }
}

impl std::error::Error for ChunkError {}

pub fn is_container(tag: [u8; 4]) -> bool {
    tag == CONTAINER_RIFF || tag == CONTAINER_LIST
}

/// Parse the first chunk in `data` as the tree root.
pub fn parse(data: &[u8]) -> Result<Chunk, ChunkError> {
    if data.is_empty() {
        return Err(ChunkError::Empty);
    }
    let mut offset = 0;
    parse_at(data, &mut offset, 0)
}

fn tag_at(data: &[u8], i: usize) -> [u8; 4] {
    [data[i], data[i + 1], data[i + 2], data[i + 3]]
}

fn parse_at(data: &[u8], offset: &mut usize, depth: usize) -> Result<Chunk, ChunkError> {
    let start = *offset;
    if depth > MAX_NESTING {
        return Err(ChunkError::TooDeep { offset: start });
    }
    if data.len().saturating_sub(start) < 8 {
        return Err(ChunkError::TruncatedHeader { offset: start });
    }
    let tag = tag_at(data, start);
    let size = u32::from_le_bytes(tag_at(data, start + 4));
    let body = start + 8;
    if data.len().saturating_sub(body) < size as usize {
        return Err(ChunkError::TruncatedPayload {
            offset: start,
            declared: size,
        });
    }
    let payload = &data[body..body + size as usize];
    *offset = body + size as usize;
    // Chunks are word-aligned; skip the pad byte after odd payloads.
    if size % 2 == 1 && *offset < data.len() {
        *offset += 1;
    }

    if is_container(tag) {
        if payload.len() < 4 {
            return Err(ChunkError::ShortContainer { offset: start });
        }
        let form = tag_at(payload, 0);
        let mut children = Vec::new();
        let mut child_offset = 4;
        while child_offset < payload.len() {
            children.push(parse_at(payload, &mut child_offset, depth + 1)?);
        }
        Ok(Chunk::Container {
            tag,
            form,
            children,
        })
    } else {
        Ok(Chunk::Leaf {
            tag,
            data: payload.to_vec(),
        })
    }
}

/// Byte-level builders for assembling cartridges in tests.
#[cfg(test)]
pub(crate) mod build {
    pub fn leaf(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    pub fn container(tag: &[u8; 4], form: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let mut body: Vec<u8> = form.to_vec();
        for child in children {
            body.extend_from_slice(child);
        }
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    pub fn riff(children: &[Vec<u8>]) -> Vec<u8> {
        container(b"RIFF", b"NXS ", children)
    }

    pub fn list(children: &[Vec<u8>]) -> Vec<u8> {
        container(b"LIST", b"sub ", children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_leaf() {
        let bytes = build::leaf(b"CODE", b"hello");
        let chunk = parse(&bytes).unwrap();
        assert_eq!(
            chunk,
            Chunk::Leaf {
                tag: *b"CODE",
                data: b"hello".to_vec()
            }
        );
    }

    #[test]
    fn parses_nested_containers() {
        let inner = build::list(&[build::leaf(b"BIN ", &[1, 2, 3, 4, 5])]);
        let bytes = build::riff(&[build::leaf(b"CODE", b"x"), inner]);
        match parse(&bytes).unwrap() {
            Chunk::Container { tag, children, .. } => {
                assert_eq!(tag, *b"RIFF");
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Chunk::Leaf { tag, .. } if tag == *b"CODE"));
                assert!(matches!(
                    &children[1],
                    Chunk::Container { tag, children, .. }
                        if *tag == *b"LIST" && children.len() == 1
                ));
            }
            other => panic!("expected container, got {:?}", other),
        }
    }

    #[test]
    fn odd_payloads_are_padded() {
        // A 1-byte leaf followed by another leaf only lines up with padding.
        let bytes = build::riff(&[build::leaf(b"CODE", b"a"), build::leaf(b"CODE", b"bc")]);
        match parse(&bytes).unwrap() {
            Chunk::Container { children, .. } => assert_eq!(children.len(), 2),
            other => panic!("expected container, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut bytes = build::leaf(b"CODE", b"hello");
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            parse(&bytes),
            Err(ChunkError::TruncatedPayload { .. })
        ));
    }

    #[test]
    fn rejects_runaway_nesting() {
        let mut chunk = build::leaf(b"CODE", b"x");
        for _ in 0..(MAX_NESTING + 8) {
            chunk = build::list(&[chunk]);
        }
        let bytes = build::riff(&[chunk]);
        assert!(matches!(parse(&bytes), Err(ChunkError::TooDeep { .. })));
    }

    #[test]
    fn nesting_within_the_cap_parses() {
        let mut chunk = build::leaf(b"CODE", b"x");
        for _ in 0..(MAX_NESTING - 2) {
            chunk = build::list(&[chunk]);
        }
        let bytes = build::riff(&[chunk]);
        assert!(parse(&bytes).is_ok());
    }

    #[test]
    fn rejects_garbage_header() {
        assert_eq!(parse(&[]), Err(ChunkError::Empty));
        assert!(matches!(
            parse(&[0x12, 0x34]),
            Err(ChunkError::TruncatedHeader { .. })
        ));
    }
}
