use std::collections::HashMap;

use blockpack::codec;
use blockpack::pack::{Accumulator, BlockCommand, CommandSink, PrefillMode};
use blockpack::tile::{BuildVolume, TileDims, TileGrid};
use blockpack::world::VoxelGrid;
use blockpack::{BlockBox, IVec3, Transform};
use proptest::prelude::*;

const TYPES: [&str; 4] = ["", "stone", "dirt", "glass"];

#[derive(Clone, Debug)]
enum Op {
    Set(IVec3, usize),
    Fill(IVec3, IVec3, usize),
}

fn pos() -> impl Strategy<Value = IVec3> {
    (-20i32..20, -8i32..24, -20i32..20).prop_map(|(x, y, z)| IVec3::new(x, y, z))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (pos(), 0..TYPES.len()).prop_map(|(p, t)| Op::Set(p, t)),
        1 => (pos(), 0i32..8, 0i32..8, 0i32..8, 0..TYPES.len())
            .prop_map(|(p, dx, dy, dz, t)| Op::Fill(p, p + IVec3::new(dx, dy, dz), t)),
    ]
}

fn dims() -> impl Strategy<Value = TileDims> {
    (1u32..=12, 1u32..=12, 1u32..=12).prop_map(|(x, y, z)| TileDims::new(x, y, z).unwrap())
}

/// Apply ops to an accumulator and to a plain position map
fn build(grid: TileGrid, ops: &[Op]) -> (Accumulator, VoxelGrid) {
    let mut acc = Accumulator::with_grid(grid, PrefillMode::Off);
    let mut model = VoxelGrid::new();
    for op in ops {
        match *op {
            Op::Set(p, t) => {
                acc.setblock(p, TYPES[t]).unwrap();
                model.setblock(p, TYPES[t]).unwrap();
            }
            Op::Fill(a, b, t) => {
                acc.fill(a, b, TYPES[t]).unwrap();
                model.fill(a, b, TYPES[t]).unwrap();
            }
        }
    }
    (acc, model)
}

fn boxes(commands: &[BlockCommand]) -> Vec<(BlockBox, &str)> {
    commands
        .iter()
        .map(|c| match c {
            BlockCommand::Setblock { pos, block_type } => {
                (BlockBox::from_point(*pos), block_type.as_str())
            }
            BlockCommand::Fill { min, max, block_type } => {
                (BlockBox::new(*min, *max), block_type.as_str())
            }
        })
        .collect()
}

fn grid_with(dims: TileDims) -> TileGrid {
    TileGrid::new(dims, BuildVolume::default()).unwrap()
}

proptest! {
    // Every written voxel is covered by exactly one command of its type
    #[test]
    fn packing_covers_each_voxel_once(ops in prop::collection::vec(op(), 1..60), dims in dims()) {
        let (acc, model) = build(grid_with(dims), &ops);
        let snapshot = acc.pack([]).unwrap();
        let mut commands: Vec<BlockCommand> = Vec::new();
        snapshot.replay(&Transform::IDENTITY, &mut commands).unwrap();

        let mut covered: HashMap<IVec3, &str> = HashMap::new();
        for (b, block_type) in boxes(&commands) {
            prop_assert!(!block_type.is_empty());
            for p in b.positions() {
                prop_assert!(covered.insert(p, block_type).is_none(), "{} covered twice", p);
            }
        }
        prop_assert_eq!(covered.len(), model.len());
        for (p, t) in model.sorted_blocks() {
            prop_assert_eq!(covered.get(&p).copied(), Some(t));
        }
    }

    // No two fills overlap and no setblock sits inside a fill
    #[test]
    fn commands_never_overlap(ops in prop::collection::vec(op(), 1..40)) {
        let (acc, _) = build(TileGrid::default(), &ops);
        let mut commands: Vec<BlockCommand> = Vec::new();
        acc.pack([]).unwrap().replay(&Transform::IDENTITY, &mut commands).unwrap();
        let boxes = boxes(&commands);
        for (i, (a, _)) in boxes.iter().enumerate() {
            for (b, _) in &boxes[i + 1..] {
                prop_assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    // Encoding, decoding and replaying reproduces the written voxels
    #[test]
    fn binary_roundtrip_replays_identically(
        ops in prop::collection::vec(op(), 1..60),
        dims in dims()
    ) {
        let (acc, model) = build(grid_with(dims), &ops);
        let snapshot = acc.pack([]).unwrap();
        let decoded = codec::decode(&codec::encode(&snapshot).unwrap()).unwrap();

        let mut replayed = VoxelGrid::new();
        decoded.replay(&Transform::IDENTITY, &mut replayed).unwrap();
        prop_assert_eq!(&replayed, &model);
        prop_assert_eq!(decoded.block_bounds(), snapshot.block_bounds());
    }

    // Replay never emits a command from a higher tile row before a lower one
    #[test]
    fn replay_is_bottom_up(ops in prop::collection::vec(op(), 1..60), dims in dims()) {
        let grid = grid_with(dims);
        let (acc, _) = build(grid, &ops);
        let mut commands: Vec<BlockCommand> = Vec::new();
        acc.pack([]).unwrap().replay(&Transform::IDENTITY, &mut commands).unwrap();
        let rows: Vec<u64> = commands
            .iter()
            .map(|c| grid.key(IVec3::new(0, c.base_y(), 0)).unwrap().y_index())
            .collect();
        prop_assert!(rows.windows(2).all(|w| w[0] <= w[1]));
    }

    // Packing twice without writes in between gives the same commands
    #[test]
    fn packing_is_repeatable(ops in prop::collection::vec(op(), 1..40)) {
        let (acc, _) = build(TileGrid::default(), &ops);
        let mut first: Vec<BlockCommand> = Vec::new();
        let mut second: Vec<BlockCommand> = Vec::new();
        acc.pack([]).unwrap().replay(&Transform::IDENTITY, &mut first).unwrap();
        acc.pack([]).unwrap().replay(&Transform::IDENTITY, &mut second).unwrap();
        prop_assert_eq!(first, second);
    }

    // Prefilling with each tile's most frequent type, then replaying, restores the voxels
    #[test]
    fn prefill_plus_replay_restores_voxels(ops in prop::collection::vec(op(), 1..40)) {
        let grid = TileGrid::default();
        let (plain, model) = build(grid, &ops);
        let mut acc = Accumulator::with_grid(grid, PrefillMode::MostFrequent);
        acc.absorb(&plain.pack([]).unwrap(), &Transform::IDENTITY).unwrap();
        let snapshot = acc.pack([]).unwrap();

        let mut world = VoxelGrid::new();
        for tile in snapshot.tiles() {
            let Some(local) = tile.prefill_type() else { continue };
            let global = tile.global_type(local).unwrap();
            let block_type = &snapshot.symbols()[global as usize];
            let origin = grid.origin(tile.key());
            world.fill(origin, origin + grid.dims().as_ivec3() - IVec3::ONE, block_type).unwrap();
        }
        // Prefill only ever covers a tile's own positions, so clear what was never written.
        let prefilled: Vec<IVec3> = world.sorted_blocks().into_iter().map(|(p, _)| p).collect();
        for p in prefilled {
            if acc.block_at(p).unwrap().is_none() {
                world.setblock(p, "").unwrap();
            }
        }
        snapshot.replay(&Transform::IDENTITY, &mut world).unwrap();
        prop_assert_eq!(&world, &model);
    }
}
