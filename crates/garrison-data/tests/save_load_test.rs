// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use approx::assert_relative_eq;
use garrison_core::math::{Quaternion, Vec3};
use garrison_core::Format;
use garrison_data::{
    BitStream, FrequencyTable, PrefixCodeTree, SavedData, SavedDataRegistry, ScopeTree,
};
use std::io::Cursor;
use tempfile::tempdir;

/// A small but deep tree exercising every common value kind.
fn build_battle(format: Format) -> ScopeTree {
    let mut tree = ScopeTree::new(format);
    let mut root = tree.root_mut();
    root.add_variable("turn").write(&17u32);

    let mut camera = root.add_child("Camera");
    camera
        .add_variable("position")
        .write(&Vec3::new(1.5, -2.25, 0.0));
    camera.add_variable("zoom").write(&0.75f32);

    let mut armies = root.add_child("Armies");
    for (name, gold) in [("North", 300i64), ("South", -12)] {
        let mut army = armies.add_child("Army");
        army.add_variable("name").write_str(name);
        army.add_variable("gold").write(&gold);
        army.add_child("Banner")
            .add_variable("colors")
            .write(&vec![0xFFu8, 0x10, 0x00]);
    }
    tree
}

#[test]
fn test_readable_save_and_reload_through_registry() -> Result<()> {
    // --- 1. ARRANGE ---
    let dir = tempdir()?;
    let registry = SavedDataRegistry::new(dir.path());
    registry.make_empty("player.txt")?;

    let data = SavedData::open(&registry, "player.txt", "")?;
    data.write(|mut root| {
        root.add_variable("hp").write(&42);
    });

    // --- 2. ACT ---
    data.save()?;
    drop(data);
    let reloaded = SavedData::open(&registry, "player.txt", "")?;

    // --- 3. ASSERT ---
    assert_eq!(reloaded.get_variable("hp").read::<i32>()?, 42);
    let text = std::fs::read_to_string(dir.path().join("player.txt"))?;
    assert_eq!(text, "\thp = 42\n");
    Ok(())
}

#[test]
fn test_binary_vector_round_trip_is_bit_exact() -> Result<()> {
    let dir = tempdir()?;
    let registry = SavedDataRegistry::new(dir.path());
    registry.make_empty("unit.dat")?;

    let position = Vec3::new(1.5, -2.25, 0.0);
    let data = SavedData::open(&registry, "unit.dat", "")?;
    data.write(|mut root| {
        root.add_child("Transform")
            .add_variable("p")
            .write(&position);
    });
    data.save()?;
    drop(data);

    let reloaded = SavedData::open(&registry, "unit.dat", "Transform")?;
    let read: Vec3 = reloaded.get_variable("p").read()?;
    assert_eq!(bytemuck::bytes_of(&read), bytemuck::bytes_of(&position));
    Ok(())
}

#[test]
fn test_readable_tree_round_trip() -> Result<()> {
    // --- 1. ARRANGE ---
    let tree = build_battle(Format::Readable);
    let mut text = Vec::new();

    // --- 2. ACT ---
    tree.write_readable(&mut text)?;
    let parsed = ScopeTree::parse_readable(Cursor::new(text))?;

    // --- 3. ASSERT ---
    assert_eq!(parsed, tree);
    let armies: Vec<_> = parsed.get_scope("Armies").children().collect();
    assert_eq!(armies.len(), 2);
    assert_eq!(armies[1].get_variable("gold").read::<i64>()?, -12);
    assert_eq!(
        armies[0].get_variable("Banner.colors").read::<Vec<u8>>()?,
        vec![0xFF, 0x10, 0x00]
    );
    assert_relative_eq!(parsed.get_variable("Camera.zoom").read::<f32>()?, 0.75);
    Ok(())
}

#[test]
fn test_binary_tree_round_trip_through_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("battle.dat");
    let tree = build_battle(Format::Binary);

    tree.to_bit_stream().serialize(&path)?;
    let restored = ScopeTree::from_bit_stream(&BitStream::deserialize(&path)?);

    assert_eq!(restored, tree);
    assert_eq!(restored.root().name(), ScopeTree::ROOT_NAME);
    Ok(())
}

#[test]
fn test_quaternion_survives_both_formats() -> Result<()> {
    let rotation = Quaternion::from_axis_angle(Vec3::Y, 0.5);

    for format in [Format::Readable, Format::Binary] {
        let mut tree = ScopeTree::new(format);
        tree.root_mut().add_variable("o").write(&rotation);
        let read: Quaternion = tree.get_variable("o").read()?;
        assert_relative_eq!(read.w, rotation.w, epsilon = 1e-6);
        assert_relative_eq!(read.y, rotation.y, epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn test_prefix_code_decodes_exactly_what_was_encoded() {
    // --- 1. ARRANGE ---
    let table: FrequencyTable<String> = [("a", 5u16), ("b", 2), ("c", 1)]
        .into_iter()
        .map(|(s, f)| (s.to_owned(), f))
        .collect();
    let mut codes = PrefixCodeTree::new(&table);
    let mut stream = BitStream::new();

    // --- 2. ACT ---
    codes.encode(&mut stream, &"c".to_owned());
    let mut reader = stream.reader();
    let decoded = codes.decode(&mut reader);

    // --- 3. ASSERT ---
    assert_eq!(decoded, "c");
    assert_eq!(reader.remaining(), 0);
    assert_eq!(stream.size_in_bits(), 2);
}

#[test]
fn test_prefix_code_is_deterministic() {
    let table: FrequencyTable<String> = ["x", "y", "z", "w", "v"]
        .into_iter()
        .zip([3u16, 3, 1, 1, 3])
        .map(|(s, f)| (s.to_owned(), f))
        .collect();
    let first = PrefixCodeTree::new(&table);
    let second = PrefixCodeTree::new(&table);

    for (symbol, _) in table.iter() {
        assert_eq!(first.path_to(symbol), second.path_to(symbol));
    }
}
