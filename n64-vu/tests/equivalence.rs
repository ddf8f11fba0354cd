//! Scalar-reference / SIMD-fast-path equivalence.
//!
//! For every op with a vector formulation, every element selector and a
//! bounded pseudo-random set of inputs, the two paths must produce identical
//! `{vd, ACC, VCO/VCC/VCE}` post-states.

#![cfg(target_arch = "x86_64")]

use n64_vu::{simd, LaneMask, V128, Vpu};
use quickcheck_macros::quickcheck;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Op = fn(&mut Vpu, usize, usize, usize, usize);

const OPS: &[(&str, Op, Op)] = &[
    ("vabs", Vpu::vabs, simd::vabs),
    ("vadd", Vpu::vadd, simd::vadd),
    ("vaddc", Vpu::vaddc, simd::vaddc),
    ("vand", Vpu::vand, simd::vand),
    ("vch", Vpu::vch, simd::vch),
    ("vcl", Vpu::vcl, simd::vcl),
    ("vcr", Vpu::vcr, simd::vcr),
    ("veq", Vpu::veq, simd::veq),
    ("vge", Vpu::vge, simd::vge),
    ("vlt", Vpu::vlt, simd::vlt),
    ("vmacf", Vpu::vmacf, simd::vmacf),
    ("vmacu", Vpu::vmacu, simd::vmacu),
    ("vmadh", Vpu::vmadh, simd::vmadh),
    ("vmadl", Vpu::vmadl, simd::vmadl),
    ("vmadm", Vpu::vmadm, simd::vmadm),
    ("vmadn", Vpu::vmadn, simd::vmadn),
    ("vmrg", Vpu::vmrg, simd::vmrg),
    ("vmudh", Vpu::vmudh, simd::vmudh),
    ("vmudl", Vpu::vmudl, simd::vmudl),
    ("vmudm", Vpu::vmudm, simd::vmudm),
    ("vmudn", Vpu::vmudn, simd::vmudn),
    ("vmulf", Vpu::vmulf, simd::vmulf),
    ("vmulu", Vpu::vmulu, simd::vmulu),
    ("vnand", Vpu::vnand, simd::vnand),
    ("vne", Vpu::vne, simd::vne),
    ("vnor", Vpu::vnor, simd::vnor),
    ("vnxor", Vpu::vnxor, simd::vnxor),
    ("vor", Vpu::vor, simd::vor),
    ("vsub", Vpu::vsub, simd::vsub),
    ("vsubc", Vpu::vsubc, simd::vsubc),
    ("vxor", Vpu::vxor, simd::vxor),
    ("vzero", Vpu::vzero, simd::vzero),
];

/// Lane values weighted toward the saturation and carry boundaries.
fn lane(rng: &mut StdRng) -> u16 {
    match rng.gen_range(0..6) {
        0 => 0x0000,
        1 => 0x0001,
        2 => 0x7fff,
        3 => 0x8000,
        4 => 0xffff,
        _ => rng.gen(),
    }
}

fn random_vpu(rng: &mut StdRng) -> Vpu {
    let mut vpu = Vpu::new();
    for reg in vpu.regs.iter_mut() {
        *reg = V128::from_lanes(core::array::from_fn(|_| lane(rng)));
    }
    vpu.acc.h = V128::from_lanes(core::array::from_fn(|_| lane(rng)));
    vpu.acc.m = V128::from_lanes(core::array::from_fn(|_| lane(rng)));
    vpu.acc.l = V128::from_lanes(core::array::from_fn(|_| lane(rng)));
    vpu.vcoh = LaneMask::from(rng.gen::<u8>());
    vpu.vcol = LaneMask::from(rng.gen::<u8>());
    vpu.vcch = LaneMask::from(rng.gen::<u8>());
    vpu.vccl = LaneMask::from(rng.gen::<u8>());
    vpu.vce = LaneMask::from(rng.gen::<u8>());
    vpu
}

#[test]
fn scalar_and_simd_post_states_agree() {
    if !simd::supported() {
        return;
    }
    let mut rng = StdRng::seed_from_u64(0x5eed_1e55);
    for &(name, scalar, vector) in OPS {
        for e in 0..16 {
            for round in 0..48 {
                let start = random_vpu(&mut rng);
                let mut a = start.clone();
                let mut b = start.clone();
                scalar(&mut a, 3, 1, 2, e);
                vector(&mut b, 3, 1, 2, e);
                assert_eq!(a, b, "{name} diverged at e={e} round={round}");
            }
        }
    }
}

#[test]
fn paths_agree_when_destination_aliases_a_source() {
    if !simd::supported() {
        return;
    }
    let mut rng = StdRng::seed_from_u64(0xa11a5);
    for &(name, scalar, vector) in OPS {
        for e in 0..16 {
            let start = random_vpu(&mut rng);
            let mut a = start.clone();
            let mut b = start.clone();
            scalar(&mut a, 1, 1, 2, e);
            vector(&mut b, 1, 1, 2, e);
            assert_eq!(a, b, "{name} diverged with vd=vs at e={e}");

            let mut a = start.clone();
            let mut b = start;
            scalar(&mut a, 2, 1, 2, e);
            vector(&mut b, 2, 1, 2, e);
            assert_eq!(a, b, "{name} diverged with vd=vt at e={e}");
        }
    }
}

#[quickcheck]
fn broadcast_paths_agree(lanes: Vec<u16>, e: u8) -> bool {
    if !simd::supported() {
        return true;
    }
    let mut padded = [0u16; 8];
    for (slot, value) in padded.iter_mut().zip(lanes) {
        *slot = value;
    }
    let v = V128::from_lanes(padded);
    v.broadcast(e as usize & 15) == simd::broadcast(v, e as usize & 15)
}
