use super::*;
use crate::color::{Palette, Rgba};
use crate::riff::build;

fn grph_payload(id: u32, w: u32, h: u32, indices: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&id.to_le_bytes());
    payload.extend_from_slice(&w.to_le_bytes());
    payload.extend_from_slice(&h.to_le_bytes());
    payload.extend_from_slice(indices);
    payload
}

fn load(children: &[Vec<u8>]) -> Cart {
    let palette = Palette::build();
    let bytes = build::riff(children);
    let root = riff::parse(&bytes).unwrap();
    Cart::from_chunk(&root, &palette)
}

#[test]
fn code_chunks_concatenate_in_traversal_order() {
    let cart = load(&[
        build::leaf(b"CODE", b"A"),
        build::list(&[build::leaf(b"CODE", b"BC")]),
        build::leaf(b"CODE", b"D"),
    ]);
    assert_eq!(cart.code, b"ABCD");
}

#[test]
fn code_assembly_survives_deep_nesting() {
    let deep = build::list(&[build::list(&[build::list(&[build::leaf(
        b"CODE", b"BC",
    )])])]);
    let cart = load(&[build::leaf(b"CODE", b"A"), deep, build::leaf(b"CODE", b"D")]);
    assert_eq!(cart.code, b"ABCD");
}

#[test]
fn graphics_decode_maps_indices_through_palette() {
    // 2x2 page: red, green, blue, white.
    let cart = load(&[build::leaf(
        b"GRPH",
        &grph_payload(1, 2, 2, &[0x07, 0x38, 0xC0, 0xFF]),
    )]);
    let page = cart.page(1).unwrap();
    assert_eq!(page.image.get(0, 0), Some(Rgba::new(255, 0, 0, 255)));
    assert_eq!(page.image.get(1, 0), Some(Rgba::new(0, 255, 0, 255)));
    assert_eq!(page.image.get(0, 1), Some(Rgba::new(0, 0, 255, 255)));
    assert_eq!(page.image.get(1, 1), Some(Rgba::new(255, 255, 255, 255)));
}

#[test]
fn truncated_graphics_leaves_sentinel_tail() {
    let cart = load(&[build::leaf(
        b"GRPH",
        &grph_payload(9, 4, 4, &[0x00; 10]),
    )]);
    let page = cart.page(9).unwrap();
    let black = Rgba::new(0, 0, 0, 255);
    for i in 0..16 {
        let (x, y) = (i % 4, i / 4);
        let expected = if i < 10 { black } else { crate::color::SENTINEL };
        assert_eq!(page.image.get(x, y), Some(expected), "pixel {}", i);
    }
}

#[test]
fn excess_index_bytes_are_ignored() {
    let cart = load(&[build::leaf(
        b"GRPH",
        &grph_payload(2, 2, 2, &[0xFF; 9]),
    )]);
    let page = cart.page(2).unwrap();
    assert_eq!(page.width, 2);
    assert_eq!(page.image.get(1, 1), Some(Rgba::new(255, 255, 255, 255)));
}

#[test]
fn undersized_graphics_chunk_is_skipped() {
    let cart = load(&[build::leaf(b"GRPH", &[1, 2, 3])]);
    assert!(cart.graphics.is_empty());
}

#[test]
fn oversized_graphics_dimensions_are_skipped() {
    // Parseable header claiming u32::MAX x u32::MAX pixels with no data.
    let cart = load(&[
        build::leaf(b"GRPH", &grph_payload(1, u32::MAX, u32::MAX, &[])),
        build::leaf(b"CODE", b"ok"),
    ]);
    assert!(cart.graphics.is_empty());
    assert_eq!(cart.code, b"ok");
}

#[test]
fn graphics_dimensions_at_the_cap_still_load() {
    // 4096x4096 sits exactly on the pixel budget.
    let indices = vec![0u8; 16];
    let cart = load(&[build::leaf(b"GRPH", &grph_payload(3, 4096, 4096, &indices))]);
    let page = cart.page(3).unwrap();
    assert_eq!(page.width, 4096);
    assert_eq!(page.height, 4096);
}

#[test]
fn later_page_shadows_same_id() {
    let cart = load(&[
        build::leaf(b"GRPH", &grph_payload(5, 1, 1, &[0x00])),
        build::leaf(b"GRPH", &grph_payload(5, 3, 1, &[0x00, 0x00, 0x00])),
    ]);
    // Both pages are retained; lookup returns the one parsed later.
    assert_eq!(cart.graphics.len(), 2);
    assert_eq!(cart.page(5).unwrap().width, 3);
}

#[test]
fn blob_payload_strips_id() {
    let mut payload = 7u32.to_le_bytes().to_vec();
    payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
    let cart = load(&[build::leaf(b"BIN ", &payload)]);
    let blob = cart.blob(7).unwrap();
    assert_eq!(blob.data, &[0xAA, 0xBB, 0xCC]);
}

#[test]
fn unknown_tags_are_ignored() {
    let cart = load(&[
        build::leaf(b"WHAT", &[1, 2, 3]),
        build::leaf(b"CODE", b"ok"),
    ]);
    assert_eq!(cart.code, b"ok");
    assert!(cart.graphics.is_empty());
    assert!(cart.blobs.is_empty());
}

fn cart_with_page() -> Cart {
    load(&[build::leaf(
        b"GRPH",
        &grph_payload(1, 4, 4, &[0x07; 16]),
    )])
}

#[test]
fn sprite_ids_start_at_zero_and_increase() {
    let mut cart = cart_with_page();
    assert_eq!(cart.define_sprite(1, 0, 0, 2, 2, None), Ok(0));
    assert_eq!(cart.define_sprite(1, 2, 2, 2, 2, None), Ok(1));
}

#[test]
fn sprite_ids_keep_increasing_after_clear() {
    let mut cart = cart_with_page();
    assert_eq!(cart.define_sprite(1, 0, 0, 1, 1, None), Ok(0));
    assert_eq!(cart.define_sprite(1, 0, 0, 1, 1, None), Ok(1));
    cart.clear_sprites();
    assert_eq!(cart.sprite_count(), 0);
    assert_eq!(cart.define_sprite(1, 0, 0, 1, 1, None), Ok(2));
}

#[test]
fn define_sprite_rejects_origin_at_edge_with_size() {
    let mut cart = cart_with_page();
    // x == page.width is a legal origin, but any width pushes past the edge.
    assert!(matches!(
        cart.define_sprite(1, 4, 0, 1, 1, None),
        Err(DefineError::PastEdge { .. })
    ));
    assert_eq!(cart.sprite_count(), 0);
}

#[test]
fn define_sprite_distinct_failures() {
    let mut cart = cart_with_page();
    assert!(matches!(
        cart.define_sprite(99, 0, 0, 1, 1, None),
        Err(DefineError::NoSuchPage(99))
    ));
    // A negative id is reported as the program passed it, not wrapped.
    let err = cart.define_sprite(-1, 0, 0, 1, 1, None).unwrap_err();
    assert_eq!(err, DefineError::NoSuchPage(-1));
    assert_eq!(err.to_string(), "no graphics page with id -1");
    assert!(matches!(
        cart.define_sprite(1, -1, 0, 1, 1, None),
        Err(DefineError::OriginOutOfBounds { .. })
    ));
    assert!(matches!(
        cart.define_sprite(1, 0, 5, 1, 1, None),
        Err(DefineError::OriginOutOfBounds { .. })
    ));
    assert!(matches!(
        cart.define_sprite(1, 0, 0, 0, 1, None),
        Err(DefineError::BadSize { .. })
    ));
    assert!(matches!(
        cart.define_sprite(1, 2, 2, 3, 1, None),
        Err(DefineError::PastEdge { .. })
    ));
    assert_eq!(cart.sprite_count(), 0);
}

#[test]
fn colorkey_zeroes_matching_pixels() {
    // Page: left column red (0x07), right column white (0xFF).
    let cart = load(&[build::leaf(
        b"GRPH",
        &grph_payload(1, 2, 2, &[0x07, 0xFF, 0x07, 0xFF]),
    )]);
    let mut cart = cart;
    let id = cart.define_sprite(1, 0, 0, 2, 2, Some(0x07)).unwrap();
    let sprite = cart.sprite(id).unwrap();
    assert_eq!(sprite.image.get(0, 0).unwrap().a, 0);
    assert_eq!(sprite.image.get(1, 0).unwrap().a, 255);
    // Keyed pixels keep their color, only alpha drops.
    assert_eq!(sprite.image.get(0, 1).unwrap().r, 255);
}

#[test]
fn sprite_lookup_returns_most_recent_first() {
    let mut cart = cart_with_page();
    let a = cart.define_sprite(1, 0, 0, 1, 1, None).unwrap();
    let b = cart.define_sprite(1, 0, 0, 2, 2, None).unwrap();
    assert_ne!(a, b);
    assert_eq!(cart.sprite(b).unwrap().image.width(), 2);
    assert_eq!(cart.sprite(a).unwrap().image.width(), 1);
}

#[test]
fn builtin_program_cart_has_no_resources() {
    let cart = Cart::from_builtin(LOAD_ERROR_PROGRAM);
    assert_eq!(cart.code, LOAD_ERROR_PROGRAM.as_bytes());
    assert!(cart.graphics.is_empty());
    assert!(cart.blobs.is_empty());
}
