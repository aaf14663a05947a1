use clap::ValueEnum;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_SCRAMBLE_LENGTH: usize = 10;
pub const MAX_SCRAMBLE_LENGTH: usize = 30;
pub const DEFAULT_SCRAMBLE_LENGTH: usize = 20;

const MODIFIERS: [&str; 3] = ["", "'", "2"];

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize, strum_macros::Display,
)]
pub enum CubeType {
    #[value(name = "2x2")]
    #[serde(rename = "2x2")]
    #[strum(to_string = "2x2")]
    TwoByTwo,
    #[default]
    #[value(name = "3x3")]
    #[serde(rename = "3x3")]
    #[strum(to_string = "3x3")]
    ThreeByThree,
}

impl CubeType {
    /// Faces a scramble for this puzzle turns
    pub fn faces(&self) -> &'static [char] {
        match self {
            CubeType::TwoByTwo => &['R', 'U', 'F'],
            CubeType::ThreeByThree => &['R', 'L', 'U', 'D', 'F', 'B'],
        }
    }

    pub fn next(&self) -> Self {
        match self {
            CubeType::TwoByTwo => CubeType::ThreeByThree,
            CubeType::ThreeByThree => CubeType::TwoByTwo,
        }
    }
}

/// Random-move scrambles: no face is turned twice in a row
#[derive(Debug, Clone, Copy)]
pub struct ScrambleGenerator {
    pub cube_type: CubeType,
    pub length: usize,
}

impl ScrambleGenerator {
    pub fn new(cube_type: CubeType, length: usize) -> Self {
        Self {
            cube_type,
            length: length.clamp(MIN_SCRAMBLE_LENGTH, MAX_SCRAMBLE_LENGTH),
        }
    }

    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let faces = self.cube_type.faces();
        let mut prev_face = None;
        let mut moves = Vec::with_capacity(self.length);

        for _ in 0..self.length {
            let face = loop {
                let candidate = *faces.choose(rng).unwrap_or(&faces[0]);
                if Some(candidate) != prev_face {
                    break candidate;
                }
            };
            prev_face = Some(face);
            let modifier = MODIFIERS.choose(rng).copied().unwrap_or_default();
            moves.push(format!("{face}{modifier}"));
        }

        moves.iter().join(" ")
    }
}

impl Default for ScrambleGenerator {
    fn default() -> Self {
        Self::new(CubeType::default(), DEFAULT_SCRAMBLE_LENGTH)
    }
}
