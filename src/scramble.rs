use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use std::fmt;

pub const MIN_LENGTH: usize = 20;
pub const MAX_LENGTH: usize = 25;

/// Chance that a candidate turning the same axis as the previous move is redrawn
const SAME_AXIS_REJECT_PROBABILITY: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Face {
    R,
    L,
    U,
    D,
    F,
    B,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::R, Face::L, Face::U, Face::D, Face::F, Face::B];

    pub fn axis(self) -> Axis {
        match self {
            Face::R | Face::L => Axis::X,
            Face::U | Face::D => Axis::Y,
            Face::F | Face::B => Axis::Z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Clockwise,
    Prime,
    Double,
}

impl Modifier {
    pub const ALL: [Modifier; 3] = [Modifier::Clockwise, Modifier::Prime, Modifier::Double];

    fn suffix(self) -> &'static str {
        match self {
            Modifier::Clockwise => "",
            Modifier::Prime => "'",
            Modifier::Double => "2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub face: Face,
    pub modifier: Modifier,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.face, self.modifier.suffix())
    }
}

/// A randomized sequence of face turns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scramble {
    pub moves: Vec<Move>,
}

impl Scramble {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

impl fmt::Display for Scramble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.moves.iter().join(" "))
    }
}

/// Generate a scramble from the thread-local RNG
pub fn generate() -> Scramble {
    generate_with(&mut rand::thread_rng())
}

/// Generate a scramble from the given RNG; identical seeds give identical scrambles
pub fn generate_with<R: Rng>(rng: &mut R) -> Scramble {
    let length = rng.gen_range(MIN_LENGTH..=MAX_LENGTH);
    let mut moves: Vec<Move> = Vec::with_capacity(length);

    for _ in 0..length {
        let previous = moves.last().map(|m| m.face);
        let face = draw_face(rng, previous);
        let modifier = *Modifier::ALL
            .choose(rng)
            .unwrap_or(&Modifier::Clockwise);
        moves.push(Move { face, modifier });
    }

    Scramble { moves }
}

fn draw_face<R: Rng>(rng: &mut R, previous: Option<Face>) -> Face {
    loop {
        let candidate = *Face::ALL.choose(rng).unwrap_or(&Face::R);
        let Some(previous) = previous else {
            return candidate;
        };

        if candidate == previous {
            continue;
        }
        if candidate.axis() == previous.axis() && rng.gen_bool(SAME_AXIS_REJECT_PROBABILITY) {
            continue;
        }

        return candidate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_length_within_bounds() {
        for _ in 0..200 {
            let scramble = generate();
            assert!((MIN_LENGTH..=MAX_LENGTH).contains(&scramble.len()));
        }
    }

    #[test]
    fn test_no_adjacent_moves_share_a_face() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let scramble = generate_with(&mut rng);
            for pair in scramble.moves.windows(2) {
                assert_ne!(pair[0].face, pair[1].face, "in {}", scramble);
            }
        }
    }

    #[test]
    fn test_same_seed_same_scramble() {
        let a = generate_with(&mut StdRng::seed_from_u64(42));
        let b = generate_with(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_axis_repeats_are_reduced_not_banned() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut same_axis = 0usize;
        let mut pairs = 0usize;
        for _ in 0..400 {
            let scramble = generate_with(&mut rng);
            for pair in scramble.moves.windows(2) {
                pairs += 1;
                if pair[0].face.axis() == pair[1].face.axis() {
                    same_axis += 1;
                }
            }
        }

        // Unconstrained the opposite face would show up 1 time in 5.
        let ratio = same_axis as f64 / pairs as f64;
        assert!(same_axis > 0);
        assert!(ratio < 0.15, "same-axis ratio {ratio}");
    }

    #[test]
    fn test_display_tokens() {
        let scramble = Scramble {
            moves: vec![
                Move {
                    face: Face::R,
                    modifier: Modifier::Clockwise,
                },
                Move {
                    face: Face::U,
                    modifier: Modifier::Double,
                },
                Move {
                    face: Face::F,
                    modifier: Modifier::Prime,
                },
            ],
        };
        assert_eq!(scramble.to_string(), "R U2 F'");
    }

    #[test]
    fn test_display_is_space_joined() {
        let scramble = generate();
        assert_eq!(scramble.to_string().split(' ').count(), scramble.len());
    }
}
