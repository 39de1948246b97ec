use crate::error::{RatingError, Result};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{convert::TryFrom, fmt, str::FromStr};

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Home = 0,
    Away = 1
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home
        }
    }
}

impl TryFrom<i32> for Side {
    type Error = ();

    fn try_from(v: i32) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Side::Home),
            1 => Ok(Side::Away),
            _ => Err(())
        }
    }
}

/// Tournament points awarded per outcome. Never used by the rating likelihoods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointValues {
    pub win: f64,
    pub draw: f64,
    pub loss: f64
}

impl Default for PointValues {
    fn default() -> Self {
        PointValues {
            win: 1.0,
            draw: 0.5,
            loss: 0.0
        }
    }
}

/// Outcome of a contest: a non-negative score pair, an optional forfeit marker
/// and the point mapping used for tournament scoring.
///
/// Parsed from the `<score>-<score>[F]` grammar, e.g. `1-0`, `1/2-1/2`, `3-1`,
/// `0.6-0.4` or `1-0F`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    home: f64,
    away: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    forfeit: Option<Side>,
    #[serde(default)]
    points: PointValues
}

impl GameResult {
    pub fn new(home: f64, away: f64) -> Result<GameResult> {
        let result = GameResult {
            home,
            away,
            forfeit: None,
            points: PointValues::default()
        };
        result.validate()?;

        Ok(result)
    }

    pub fn win() -> GameResult {
        GameResult {
            home: 1.0,
            away: 0.0,
            forfeit: None,
            points: PointValues::default()
        }
    }

    pub fn loss() -> GameResult {
        GameResult::win().swapped()
    }

    pub fn draw() -> GameResult {
        GameResult {
            home: 0.5,
            away: 0.5,
            forfeit: None,
            points: PointValues::default()
        }
    }

    pub fn forfeited_by(mut self, side: Side) -> GameResult {
        self.forfeit = Some(side);
        self
    }

    pub fn with_points(mut self, points: PointValues) -> GameResult {
        self.points = points;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let rendered = self.to_string();
        for score in [self.home, self.away] {
            if !score.is_finite() || score < 0.0 {
                return Err(RatingError::InvalidResult {
                    input: rendered,
                    reason: "scores must be finite and non-negative"
                });
            }
        }

        Ok(())
    }

    pub fn home_score(&self) -> f64 {
        self.home
    }

    pub fn away_score(&self) -> f64 {
        self.away
    }

    pub fn forfeit(&self) -> Option<Side> {
        self.forfeit
    }

    pub fn is_forfeit(&self) -> bool {
        self.forfeit.is_some()
    }

    /// The home side's share of the total score in `[0, 1]`. A `0-0` counts as a draw.
    pub fn home_share(&self) -> f64 {
        let total = self.home + self.away;
        if total <= 0.0 {
            return 0.5;
        }

        self.home / total
    }

    /// Tournament points for (home, away) under this result's point mapping.
    pub fn points(&self) -> (f64, f64) {
        let p = self.points;
        match self.home.partial_cmp(&self.away) {
            Some(std::cmp::Ordering::Greater) => (p.win, p.loss),
            Some(std::cmp::Ordering::Less) => (p.loss, p.win),
            _ => (p.draw, p.draw)
        }
    }

    pub fn swapped(&self) -> GameResult {
        GameResult {
            home: self.away,
            away: self.home,
            forfeit: self.forfeit.map(Side::opposite),
            points: self.points
        }
    }
}

fn invalid(input: &str, reason: &'static str) -> RatingError {
    RatingError::InvalidResult {
        input: input.to_string(),
        reason
    }
}

fn strip_forfeit(score: &str) -> (&str, bool) {
    match score.strip_suffix('F') {
        Some(rest) => (rest, true),
        None => (score, false)
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.starts_with('.') || s.ends_with('.') {
        return None;
    }
    if !s.chars().all(|c| c.is_ascii_digit() || c == '.') || s.matches('.').count() > 1 {
        return None;
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_score(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((numerator, denominator)) => {
            let n = parse_number(numerator)?;
            let d = parse_number(denominator)?;
            (d > 0.0).then(|| n / d)
        }
        None => parse_number(s)
    }
}

impl FromStr for GameResult {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let (home, away) = input
            .split_once('-')
            .ok_or_else(|| invalid(input, "expected '<score>-<score>'"))?;

        let (home, home_forfeit) = strip_forfeit(home.trim());
        let (away, away_forfeit) = strip_forfeit(away.trim());

        let forfeit = match (home_forfeit, away_forfeit) {
            (true, true) => return Err(invalid(input, "forfeit marked on both sides")),
            (true, false) => Some(Side::Home),
            (false, true) => Some(Side::Away),
            (false, false) => None
        };

        let home = parse_score(home).ok_or_else(|| invalid(input, "home score is not a non-negative number"))?;
        let away = parse_score(away).ok_or_else(|| invalid(input, "away score is not a non-negative number"))?;

        Ok(GameResult {
            home,
            away,
            forfeit,
            points: PointValues::default()
        })
    }
}

fn format_score(score: f64) -> String {
    if score == 0.5 {
        "1/2".to_string()
    } else if score.fract() == 0.0 {
        format!("{:.0}", score)
    } else {
        format!("{}", score)
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = |side: Side| if self.forfeit == Some(side) { "F" } else { "" };
        write!(
            f,
            "{}{}-{}{}",
            format_score(self.home),
            marker(Side::Home),
            format_score(self.away),
            marker(Side::Away)
        )
    }
}
