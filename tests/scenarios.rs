//! End-to-end scenarios built from the `tests/support` fixtures, covering
//! one construction per container variant.

mod support;

use std::rc::Rc;

use kitty_fields::{ContainerKind, DefaultEncoder, TemplateBuilder};
use support::{Eq, Group, Static};

fn render_all(template: &mut kitty_fields::Template) -> Vec<Vec<u8>> {
    let mut out = vec![template.render().unwrap().to_bytes()];
    while template.mutate().unwrap() {
        out.push(template.render().unwrap().to_bytes());
    }
    out
}

/// Plain sibling odometer: exhaust the first group before the second one
/// starts moving.
#[test]
fn plain_odometer_exhausts_children_in_order() {
    let mut b = TemplateBuilder::new("s1");
    b.push_leaf(Some("L"), Box::new(Group::new(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]))).unwrap();
    b.push_leaf(None, Box::new(Group::new(vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]))).unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.num_mutations().unwrap(), 4);
    let rendered: Vec<String> = render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    assert_eq!(rendered, vec!["a1", "b1", "c1", "a2", "a3"]);
}

/// `ForEach`'s own count is `children_sum * max(target.num_mutations, 1)`.
/// `L` here is also an ordinary sibling, so the container's plain odometer
/// drives it through its own states first (exhausting and resetting it to
/// its default) before `ForEach` gets its turn and starts re-mutating the
/// same field directly: `L` never gets driven back to its default value by
/// `ForEach` itself, so the two low `inner` values that land while `L` is at
/// its default are only ever seen once, from the plain odometer phase, not
/// once per `inner` value.
#[test]
fn foreach_drives_target_and_children_as_a_cross_product() {
    let mut b = TemplateBuilder::new("s2");
    b.push_leaf(Some("L"), Box::new(Group::new(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]))).unwrap();
    b.with_container(None, ContainerKind::for_each("L"), |b| {
        b.push_leaf(None, Box::new(Group::new(vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()])))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    // L: 2 mutations, inner: 2 mutations, so ForEach = 2 * 2 = 4, plus L's
    // own 2 as a plain sibling = 6.
    assert_eq!(t.num_mutations().unwrap(), 6);
    let rendered: Vec<String> = render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    assert_eq!(rendered, vec!["a1", "b1", "c1", "b2", "b3", "c2", "c3"]);
}

/// With single-mutation groups on both sides, `ForEach`'s count collapses to
/// `1 * 1 = 1`: the plain odometer's own pass over `L` and `ForEach`'s single
/// pass together visit every reachable state exactly once.
#[test]
fn foreach_cross_product_covers_every_reachable_pair_at_this_scale() {
    let mut b = TemplateBuilder::new("foreach_only");
    b.push_leaf(Some("L"), Box::new(Group::new(vec![b"a".to_vec(), b"b".to_vec()]))).unwrap();
    b.with_container(None, ContainerKind::for_each("L"), |b| {
        b.push_leaf(None, Box::new(Group::new(vec![b"1".to_vec(), b"2".to_vec()])))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.num_mutations().unwrap(), 2);
    let seen: std::collections::HashSet<String> =
        render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    let expected: std::collections::HashSet<String> = ["a1", "b1", "b2"].into_iter().map(String::from).collect();
    assert_eq!(seen, expected);
}

#[test]
fn if_renders_children_only_when_condition_holds() {
    let mut b = TemplateBuilder::new("s3");
    b.push_leaf(Some("L"), Box::new(Group::new(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]))).unwrap();
    b.with_container(None, ContainerKind::if_cond(Box::new(Eq::new("L", *b"a"))), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"dvil")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.num_mutations().unwrap(), 2);
    let rendered: Vec<String> = render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    assert_eq!(rendered, vec!["advil", "b", "c"]);
}

#[test]
fn if_not_renders_children_unless_condition_holds() {
    let mut b = TemplateBuilder::new("s4");
    b.push_leaf(Some("L"), Box::new(Group::new(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]))).unwrap();
    b.with_container(None, ContainerKind::if_not(Box::new(Eq::new("L", *b"a"))), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"ar")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.num_mutations().unwrap(), 2);
    let rendered: Vec<String> = render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    assert_eq!(rendered, vec!["a", "bar", "car"]);
}

#[test]
fn repeat_length_phase_then_content_phase() {
    let mut b = TemplateBuilder::new("s5");
    b.with_container(None, ContainerKind::repeat(5, 10, 5).unwrap(), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"a")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    // Static never mutates, so the only mutation is the length-phase jump
    // from min_times to max_times.
    assert_eq!(t.num_mutations().unwrap(), 1);
    let rendered: Vec<String> = render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    assert_eq!(rendered, vec!["aaaaa", "aaaaaaaaaa"]);
}

#[test]
fn meta_renders_to_nothing_but_keeps_siblings_intact() {
    let mut b = TemplateBuilder::new("s6");
    b.push_leaf(None, Box::new(Static::new(*b"no sp"))).unwrap();
    b.with_container(None, ContainerKind::meta(), |b| {
        b.push_leaf(None, Box::new(Static::new(*b" ")))?;
        Ok(())
    })
    .unwrap();
    b.push_leaf(None, Box::new(Static::new(*b"ace"))).unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.num_mutations().unwrap(), 0);
    assert_eq!(t.render().unwrap().to_bytes(), b"no space".to_vec());
}

#[test]
fn trunc_cuts_the_rendered_buffer_to_an_exact_bit_length() {
    let mut b = TemplateBuilder::new("s7");
    b.with_container(None, ContainerKind::trunc(16), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"ABCDEF")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.render().unwrap().to_bytes(), b"AB".to_vec());
}

#[test]
fn one_of_selects_exactly_one_child_per_mutation() {
    let mut b = TemplateBuilder::new("one_of");
    b.with_container(None, ContainerKind::one_of(), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"x")))?;
        b.push_leaf(None, Box::new(Static::new(*b"y")))?;
        b.push_leaf(None, Box::new(Static::new(*b"z")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    assert_eq!(t.num_mutations().unwrap(), 3);
    let rendered: Vec<String> = render_all(&mut t).into_iter().map(|b| String::from_utf8(b).unwrap()).collect();
    assert_eq!(rendered, vec!["x", "x", "y", "z"]);
}

/// The exact sampled subsets are an RNG implementation detail; what's
/// checked here is the documented shape of the enumeration: one state per
/// sampled subset, each rendering to between `min_elements` and
/// `max_elements` single-byte children.
#[test]
fn take_from_enumerates_one_state_per_sampled_subset() {
    let mut b = TemplateBuilder::new("take_from");
    let encoder: Rc<dyn kitty_fields::Encoder> = Rc::new(DefaultEncoder);
    b.with_container(None, ContainerKind::take_from(Some(1), Some(2), encoder), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"1")))?;
        b.push_leaf(None, Box::new(Static::new(*b"2")))?;
        b.push_leaf(None, Box::new(Static::new(*b"3")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    let n = t.num_mutations().unwrap();
    assert!(n > 0);
    for rendered in render_all(&mut t) {
        assert!(rendered.len() >= 1 && rendered.len() <= 2, "unexpected subset size: {rendered:?}");
        assert!(rendered.iter().all(|b| (b'1'..=b'3').contains(b)));
    }
}

#[test]
fn pad_fills_out_to_the_requested_bit_length() {
    let mut b = TemplateBuilder::new("pad");
    b.with_container(None, ContainerKind::pad(40, 0x00), |b| {
        b.push_leaf(None, Box::new(Static::new(*b"hi")))?;
        Ok(())
    })
    .unwrap();
    let mut t = b.build().unwrap();

    let rendered = t.render().unwrap();
    assert_eq!(rendered.len_bits(), 40);
    assert_eq!(rendered.to_bytes(), vec![b'h', b'i', 0, 0, 0]);
}
