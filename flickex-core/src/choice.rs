use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Position of an image within one display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Display surface, one per eye of the stereoscope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// File-name suffix of the images meant for this eye.
    pub fn suffix(self) -> &'static str {
        match self {
            Eye::Left => "_L",
            Eye::Right => "_R",
        }
    }
}

/// The answer options of a forced-choice trial.
///
/// `None` doubles as "no correct option" on trials that are not scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    #[default]
    None,
    Left,
    Right,
}

impl Choice {
    pub fn side(self) -> Option<Side> {
        match self {
            Choice::None => None,
            Choice::Left => Some(Side::Left),
            Choice::Right => Some(Side::Right),
        }
    }

    pub fn opposite(self) -> Choice {
        match self {
            Choice::None => Choice::None,
            Choice::Left => Choice::Right,
            Choice::Right => Choice::Left,
        }
    }
}

impl From<Side> for Choice {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => Choice::Left,
            Side::Right => Choice::Right,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Choice::None => "None",
            Choice::Left => "Left",
            Choice::Right => "Right",
        })
    }
}

// Older run files store the answer as 0/1/2, newer ones as a name.
impl<'de> Deserialize<'de> for Choice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChoiceVisitor;

        impl Visitor<'_> for ChoiceVisitor {
            type Value = Choice;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"left\", \"right\", \"none\" or 0..=2")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Choice, E> {
                match v {
                    0 => Ok(Choice::None),
                    1 => Ok(Choice::Left),
                    2 => Ok(Choice::Right),
                    other => Err(E::invalid_value(de::Unexpected::Unsigned(other), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Choice, E> {
                u64::try_from(v)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Choice, E> {
                match v.to_ascii_lowercase().as_str() {
                    "none" | "" => Ok(Choice::None),
                    "left" | "l" => Ok(Choice::Left),
                    "right" | "r" => Ok(Choice::Right),
                    _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
                }
            }
        }

        deserializer.deserialize_any(ChoiceVisitor)
    }
}

/// How the two eyes are fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewingMode {
    #[default]
    Stereo,
    #[serde(alias = "mono_l")]
    MonoLeft,
    #[serde(alias = "mono_r")]
    MonoRight,
}

impl ViewingMode {
    /// Which eye's image files feed the given surface.
    pub fn source_for(self, eye: Eye) -> Eye {
        match self {
            ViewingMode::Stereo => eye,
            ViewingMode::MonoLeft => Eye::Left,
            ViewingMode::MonoRight => Eye::Right,
        }
    }

    /// The distinct image sources this mode needs, in load order.
    pub fn sources(self) -> &'static [Eye] {
        match self {
            ViewingMode::Stereo => &Eye::BOTH,
            ViewingMode::MonoLeft => &[Eye::Left],
            ViewingMode::MonoRight => &[Eye::Right],
        }
    }
}

impl fmt::Display for ViewingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewingMode::Stereo => "Stereo",
            ViewingMode::MonoLeft => "MonoLeft",
            ViewingMode::MonoRight => "MonoRight",
        })
    }
}

/// A left/right pair, indexable by either [`Side`] or [`Eye`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pair<T> {
    pub left: T,
    pub right: T,
}

impl<T> Pair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn splat(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            left: value.clone(),
            right: value,
        }
    }

    pub fn as_ref(&self) -> Pair<&T> {
        Pair {
            left: &self.left,
            right: &self.right,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Pair<U> {
        Pair {
            left: f(self.left),
            right: f(self.right),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.left, &self.right].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        [&mut self.left, &mut self.right].into_iter()
    }
}

impl<T> Index<Side> for Pair<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

impl<T> IndexMut<Side> for Pair<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

impl<T> Index<Eye> for Pair<T> {
    type Output = T;

    fn index(&self, eye: Eye) -> &T {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }
}

impl<T> IndexMut<Eye> for Pair<T> {
    fn index_mut(&mut self, eye: Eye) -> &mut T {
        match eye {
            Eye::Left => &mut self.left,
            Eye::Right => &mut self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_parses_names_and_legacy_numbers() {
        let parsed: Vec<Choice> =
            serde_json::from_str(r#"["left", "Right", "none", 1, 2, 0]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Choice::Left,
                Choice::Right,
                Choice::None,
                Choice::Left,
                Choice::Right,
                Choice::None
            ]
        );
        assert!(serde_json::from_str::<Choice>("3").is_err());
        assert!(serde_json::from_str::<Choice>(r#""up""#).is_err());
    }

    #[test]
    fn mono_modes_feed_both_eyes_from_one_source() {
        assert_eq!(ViewingMode::MonoLeft.source_for(Eye::Right), Eye::Left);
        assert_eq!(ViewingMode::MonoRight.source_for(Eye::Left), Eye::Right);
        assert_eq!(ViewingMode::Stereo.source_for(Eye::Right), Eye::Right);
        assert_eq!(ViewingMode::Stereo.sources().len(), 2);
        assert_eq!(ViewingMode::MonoLeft.sources(), &[Eye::Left]);
    }

    #[test]
    fn pair_indexes_by_side_and_eye() {
        let mut pair = Pair::new(1, 2);
        pair[Side::Right] += 10;
        assert_eq!(pair[Eye::Left], 1);
        assert_eq!(pair[Eye::Right], 12);
        assert_eq!(pair.map(|v| v * 2), Pair::new(2, 24));
    }
}
