//! The dare challenge: three players, one of them picked at random performs a
//! dare given by another, then the other two rate the performance.
//!
//! [`DarePhase`] carries exactly the data that is valid in each phase and
//! [`DareGame::apply`] is the only way to move between phases. Timed steps
//! are driven by [`DareEvent::Tick`]s from whoever hosts the game.

use std::{collections::BTreeMap, time::Duration};

use rand::Rng;

pub const ROSTER_SIZE: usize = 3;
/// Pause between a full roster and the performer being picked.
pub const SELECTION_DELAY: Duration = Duration::from_secs(2);
pub const PERFORMANCE_TIME: Duration = Duration::from_secs(60);
pub const MAX_POINTS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub username: String,
}

impl Player {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Player {
        Player {
            id: id.into(),
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DarePhase {
    #[default]
    Waiting,
    Selecting {
        players: Vec<Player>,
        elapsed: Duration,
    },
    DareInput {
        players: Vec<Player>,
        performer: usize,
    },
    Performing {
        players: Vec<Player>,
        performer: usize,
        dare: String,
        time_left: Duration,
    },
    Voting {
        players: Vec<Player>,
        performer: usize,
        dare: String,
        votes: BTreeMap<String, u8>,
    },
    Results {
        players: Vec<Player>,
        performer: usize,
        dare: String,
        votes: BTreeMap<String, u8>,
        score: u32,
    },
}

impl DarePhase {
    pub fn name(&self) -> &'static str {
        match self {
            DarePhase::Waiting => "waiting",
            DarePhase::Selecting { .. } => "selecting",
            DarePhase::DareInput { .. } => "dare_input",
            DarePhase::Performing { .. } => "performing",
            DarePhase::Voting { .. } => "voting",
            DarePhase::Results { .. } => "results",
        }
    }

    pub fn players(&self) -> &[Player] {
        match self {
            DarePhase::Waiting => &[],
            DarePhase::Selecting { players, .. }
            | DarePhase::DareInput { players, .. }
            | DarePhase::Performing { players, .. }
            | DarePhase::Voting { players, .. }
            | DarePhase::Results { players, .. } => players,
        }
    }

    pub fn performer(&self) -> Option<&Player> {
        match self {
            DarePhase::DareInput { players, performer }
            | DarePhase::Performing { players, performer, .. }
            | DarePhase::Voting { players, performer, .. }
            | DarePhase::Results { players, performer, .. } => players.get(*performer),
            DarePhase::Waiting | DarePhase::Selecting { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DareEvent {
    RosterReady(Vec<Player>),
    Tick(Duration),
    SubmitDare { by: String, text: String },
    PerformanceDone { by: String },
    Vote { by: String, points: u8 },
    Reset,
}

impl DareEvent {
    fn name(&self) -> &'static str {
        match self {
            DareEvent::RosterReady(_) => "roster",
            DareEvent::Tick(_) => "tick",
            DareEvent::SubmitDare { .. } => "dare",
            DareEvent::PerformanceDone { .. } => "performance done",
            DareEvent::Vote { .. } => "vote",
            DareEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DareError {
    #[error("a dare challenge needs exactly {size} distinct players", size = ROSTER_SIZE)]
    Roster,
    #[error("{event} is not accepted while {phase}")]
    OutOfPhase {
        event: &'static str,
        phase: &'static str,
    },
    #[error("{0} is not playing")]
    Stranger(String),
    #[error("the performer cannot {0}")]
    Performer(&'static str),
    #[error("only the performer can finish the performance")]
    NotPerformer,
    #[error("a dare cannot be blank")]
    BlankDare,
    #[error("votes go from 1 to {max}, not {0}", max = MAX_POINTS)]
    Points(u8),
    #[error("{0} already voted")]
    DuplicateVote(String),
}

#[derive(Debug, Clone, Default)]
pub struct DareGame {
    phase: DarePhase,
}

impl DareGame {
    pub fn new() -> DareGame {
        DareGame::default()
    }

    pub fn phase(&self) -> &DarePhase {
        &self.phase
    }

    /// Applies `event`. A rejected event leaves the game as it was.
    pub fn apply<R: Rng + ?Sized>(&mut self, event: DareEvent, rng: &mut R) -> Result<&DarePhase, DareError> {
        self.phase = transition(&self.phase, event, rng)?;
        Ok(&self.phase)
    }

    /// Time until the current phase moves on by itself, if it ever does.
    pub fn until_next_timer(&self) -> Option<Duration> {
        match &self.phase {
            DarePhase::Selecting { elapsed, .. } => Some(SELECTION_DELAY.saturating_sub(*elapsed)),
            DarePhase::Performing { time_left, .. } => Some(*time_left),
            _ => None,
        }
    }
}

fn seat(players: &[Player], id: &str) -> Result<usize, DareError> {
    players
        .iter()
        .position(|player| player.id == id)
        .ok_or_else(|| DareError::Stranger(id.to_owned()))
}

fn transition<R: Rng + ?Sized>(phase: &DarePhase, event: DareEvent, rng: &mut R) -> Result<DarePhase, DareError> {
    use DareEvent::*;
    use DarePhase::*;

    match (phase, event) {
        (_, Reset) => Ok(Waiting),

        (Waiting, RosterReady(players)) => {
            let mut ids: Vec<&str> = players.iter().map(|player| player.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            if players.len() != ROSTER_SIZE || ids.len() != ROSTER_SIZE {
                return Err(DareError::Roster);
            }
            Ok(Selecting { players, elapsed: Duration::ZERO })
        }

        (Selecting { players, elapsed }, Tick(dt)) => {
            let elapsed = *elapsed + dt;
            if elapsed < SELECTION_DELAY {
                return Ok(Selecting { players: players.clone(), elapsed });
            }
            Ok(DareInput {
                players: players.clone(),
                performer: rng.random_range(0..players.len()),
            })
        }

        (DareInput { players, performer }, SubmitDare { by, text }) => {
            if seat(players, &by)? == *performer {
                return Err(DareError::Performer("give the dare"));
            }
            let dare = text.trim();
            if dare.is_empty() {
                return Err(DareError::BlankDare);
            }
            Ok(Performing {
                players: players.clone(),
                performer: *performer,
                dare: dare.to_owned(),
                time_left: PERFORMANCE_TIME,
            })
        }

        (Performing { players, performer, dare, time_left }, Tick(dt)) => {
            let time_left = time_left.saturating_sub(dt);
            if !time_left.is_zero() {
                return Ok(Performing {
                    players: players.clone(),
                    performer: *performer,
                    dare: dare.clone(),
                    time_left,
                });
            }
            Ok(Voting {
                players: players.clone(),
                performer: *performer,
                dare: dare.clone(),
                votes: BTreeMap::new(),
            })
        }

        (Performing { players, performer, dare, .. }, PerformanceDone { by }) => {
            if seat(players, &by)? != *performer {
                return Err(DareError::NotPerformer);
            }
            Ok(Voting {
                players: players.clone(),
                performer: *performer,
                dare: dare.clone(),
                votes: BTreeMap::new(),
            })
        }

        (Voting { players, performer, dare, votes }, Vote { by, points }) => {
            if seat(players, &by)? == *performer {
                return Err(DareError::Performer("vote"));
            }
            if !(1..=MAX_POINTS).contains(&points) {
                return Err(DareError::Points(points));
            }
            if votes.contains_key(&by) {
                return Err(DareError::DuplicateVote(by));
            }

            let mut votes = votes.clone();
            votes.insert(by, points);
            if votes.len() < players.len() - 1 {
                return Ok(Voting {
                    players: players.clone(),
                    performer: *performer,
                    dare: dare.clone(),
                    votes,
                });
            }

            let score = votes.values().map(|&points| u32::from(points)).sum();
            Ok(Results {
                players: players.clone(),
                performer: *performer,
                dare: dare.clone(),
                votes,
                score,
            })
        }

        // time passing in an untimed phase
        (_, Tick(_)) => Ok(phase.clone()),

        (phase, event) => Err(DareError::OutOfPhase {
            event: event.name(),
            phase: phase.name(),
        }),
    }
}
