use std::time::SystemTime;

use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    config::ScoringRules,
    dao::models::{
        AnswerOptionEntity, PlayerAnswerEntity, PlayerEntity, QuestionEntity, QuizEntity,
        SessionEntity, SessionStatusEntity,
    },
    state::{scoring, state_machine::SessionPhase},
};

/// Number of answer options every question carries.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// One selectable answer of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    /// Text displayed on the answer button.
    pub text: String,
    /// Whether picking this option scores.
    pub is_correct: bool,
}

/// A timed multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question text.
    pub text: String,
    /// The answer options, in display order.
    pub options: Vec<AnswerOption>,
    /// Countdown length in seconds.
    pub time_limit_secs: u32,
}

impl Question {
    /// Indexes of the options flagged as correct.
    pub fn correct_indexes(&self) -> Vec<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.is_correct)
            .map(|(index, _)| index)
            .collect()
    }
}

/// Quiz definition played by a session. Immutable once the session exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    /// Quiz title.
    pub title: String,
    /// Questions, in play order.
    pub questions: Vec<Question>,
}

/// Answer a player submitted for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerAnswer {
    /// Question the answer belongs to.
    pub question_index: usize,
    /// Option picked by the player.
    pub answer_index: usize,
    /// Whether the option was correct.
    pub correct: bool,
    /// Points awarded for this answer.
    pub points: u32,
    /// Wall-clock submission time.
    pub answered_at: SystemTime,
}

/// Player registered in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier handed back on join.
    pub id: Uuid,
    /// Display name, unique within the session.
    pub name: String,
    /// Sum of the points of every answer.
    pub score: u32,
    /// Submitted answers, at most one per question.
    pub answers: Vec<PlayerAnswer>,
    /// Join timestamp.
    pub joined_at: SystemTime,
}

impl Player {
    fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            score: 0,
            answers: Vec::new(),
            joined_at: SystemTime::now(),
        }
    }

    /// Answer recorded for `question_index`, if any.
    pub fn answer_for(&self, question_index: usize) -> Option<&PlayerAnswer> {
        self.answers
            .iter()
            .find(|answer| answer.question_index == question_index)
    }
}

/// Position of a player in the ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// 1-based rank; ties keep join order.
    pub rank: usize,
    /// Player identifier.
    pub player_id: Uuid,
    /// Player display name.
    pub name: String,
    /// Cumulative score.
    pub score: u32,
}

/// Reasons a roster mutation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// No player with this identifier joined the session.
    #[error("player `{0}` not found")]
    UnknownPlayer(Uuid),
    /// The session already holds the maximum number of players.
    #[error("session is full ({0} players)")]
    RosterFull(usize),
    /// The player already answered the question.
    #[error("player already answered question {0}")]
    AlreadyAnswered(usize),
    /// The answer targets another question than the one being played.
    #[error("question {got} is not open (current question is {expected})")]
    WrongQuestion {
        /// Question currently open.
        expected: usize,
        /// Question referenced by the submission.
        got: usize,
    },
    /// The picked option does not exist.
    #[error("answer index {0} is out of range")]
    InvalidAnswerIndex(usize),
    /// The countdown already reached zero.
    #[error("time is up for question {0}")]
    TimeUp(usize),
}

/// Aggregated state of a quiz session.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// 6-digit PIN players use to join.
    pub pin: String,
    /// Quiz being played.
    pub quiz: Quiz,
    /// Players keyed by identifier, in join order.
    pub players: IndexMap<Uuid, Player>,
    /// Index of the question currently (or last) played.
    pub current_question_index: usize,
    /// Wall-clock start of the current question countdown.
    pub question_started_at: Option<SystemTime>,
    /// Monotonic start of the current question countdown, used for scoring.
    pub question_clock: Option<Instant>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the session was mutated.
    pub updated_at: SystemTime,
    /// Monotonic instant of the last mutation, used for eviction.
    pub last_activity: Instant,
}

impl GameSession {
    /// Build a new session sitting in the lobby.
    pub fn new(pin: String, quiz: Quiz) -> Self {
        let now = SystemTime::now();
        Self {
            pin,
            quiz,
            players: IndexMap::new(),
            current_question_index: 0,
            question_started_at: None,
            question_clock: None,
            created_at: now,
            updated_at: now,
            last_activity: Instant::now(),
        }
    }

    /// Record that the session was mutated.
    pub fn touch(&mut self) {
        self.updated_at = SystemTime::now();
        self.last_activity = Instant::now();
    }

    /// Question at `index`, if the quiz has one.
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.quiz.questions.get(index)
    }

    /// Question currently open (or last played).
    pub fn current_question(&self) -> Option<&Question> {
        self.question(self.current_question_index)
    }

    /// Whether a question exists after the current one.
    pub fn has_next_question(&self) -> bool {
        self.current_question_index + 1 < self.quiz.questions.len()
    }

    /// Open question `index` and start its countdown now.
    pub fn open_question(&mut self, index: usize) {
        self.current_question_index = index;
        self.question_started_at = Some(SystemTime::now());
        self.question_clock = Some(Instant::now());
        self.touch();
    }

    /// Whole seconds left on the current countdown.
    pub fn time_left_secs(&self) -> u32 {
        let Some(question) = self.current_question() else {
            return 0;
        };
        match self.question_clock {
            Some(started) => scoring::time_left_secs(question.time_limit_secs, started.elapsed()),
            None => question.time_limit_secs,
        }
    }

    /// Find a player by exact display name, ignoring surrounding whitespace.
    pub fn find_player_by_name(&self, name: &str) -> Option<&Player> {
        let name = name.trim();
        self.players.values().find(|player| player.name == name)
    }

    /// Append a fresh player to the roster.
    pub fn add_player(&mut self, name: &str, max_players: usize) -> Result<Player, RosterError> {
        if self.players.len() >= max_players {
            return Err(RosterError::RosterFull(max_players));
        }

        let player = Player::new(name.trim().to_string());
        self.players.insert(player.id, player.clone());
        self.touch();
        Ok(player)
    }

    /// Score and record an answer for the open question, `time_left` seconds
    /// before its countdown ends.
    ///
    /// Callers are responsible for checking that the session is in its
    /// answering stage; this only enforces roster-level rules.
    pub fn record_answer(
        &mut self,
        rules: &ScoringRules,
        player_id: Uuid,
        question_index: usize,
        answer_index: usize,
        time_left: u32,
    ) -> Result<PlayerAnswer, RosterError> {
        if question_index != self.current_question_index {
            return Err(RosterError::WrongQuestion {
                expected: self.current_question_index,
                got: question_index,
            });
        }

        let question = self
            .current_question()
            .ok_or(RosterError::WrongQuestion {
                expected: self.current_question_index,
                got: question_index,
            })?;
        let option = question
            .options
            .get(answer_index)
            .ok_or(RosterError::InvalidAnswerIndex(answer_index))?;
        let correct = option.is_correct;
        let time_limit = question.time_limit_secs;

        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(RosterError::UnknownPlayer(player_id))?;
        if player.answer_for(question_index).is_some() {
            return Err(RosterError::AlreadyAnswered(question_index));
        }
        if time_left == 0 {
            return Err(RosterError::TimeUp(question_index));
        }

        let answer = PlayerAnswer {
            question_index,
            answer_index,
            correct,
            points: scoring::points_for(rules, correct, time_left, time_limit),
            answered_at: SystemTime::now(),
        };
        player.score = player.score.saturating_add(answer.points);
        player.answers.push(answer.clone());
        self.touch();

        Ok(answer)
    }

    /// Number of players who answered `question_index`.
    pub fn answered_count(&self, question_index: usize) -> usize {
        self.players
            .values()
            .filter(|player| player.answer_for(question_index).is_some())
            .count()
    }

    /// Players ranked by score, highest first; equal scores keep join order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut players = self.players.values().collect::<Vec<_>>();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
            .into_iter()
            .enumerate()
            .map(|(position, player)| Standing {
                rank: position + 1,
                player_id: player.id,
                name: player.name.clone(),
                score: player.score,
            })
            .collect()
    }
}

impl From<SessionPhase> for SessionStatusEntity {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Lobby => SessionStatusEntity::Lobby,
            SessionPhase::Playing(_) => SessionStatusEntity::Playing,
            SessionPhase::Finished => SessionStatusEntity::Finished,
        }
    }
}

impl From<&Quiz> for QuizEntity {
    fn from(quiz: &Quiz) -> Self {
        Self {
            title: quiz.title.clone(),
            questions: quiz
                .questions
                .iter()
                .map(|question| QuestionEntity {
                    text: question.text.clone(),
                    answers: question
                        .options
                        .iter()
                        .map(|option| AnswerOptionEntity {
                            text: option.text.clone(),
                            is_correct: option.is_correct,
                        })
                        .collect(),
                    time_limit_secs: question.time_limit_secs,
                })
                .collect(),
        }
    }
}

impl From<QuizEntity> for Quiz {
    fn from(entity: QuizEntity) -> Self {
        Self {
            title: entity.title,
            questions: entity
                .questions
                .into_iter()
                .map(|question| Question {
                    text: question.text,
                    options: question
                        .answers
                        .into_iter()
                        .map(|option| AnswerOption {
                            text: option.text,
                            is_correct: option.is_correct,
                        })
                        .collect(),
                    time_limit_secs: question.time_limit_secs,
                })
                .collect(),
        }
    }
}

impl From<&Player> for PlayerEntity {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            score: player.score,
            answers: player
                .answers
                .iter()
                .map(|answer| PlayerAnswerEntity {
                    question_index: answer.question_index,
                    answer_index: answer.answer_index,
                    correct: answer.correct,
                    points: answer.points,
                    answered_at: answer.answered_at,
                })
                .collect(),
            joined_at: player.joined_at,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            score: entity.score,
            answers: entity
                .answers
                .into_iter()
                .map(|answer| PlayerAnswer {
                    question_index: answer.question_index,
                    answer_index: answer.answer_index,
                    correct: answer.correct,
                    points: answer.points,
                    answered_at: answer.answered_at,
                })
                .collect(),
            joined_at: entity.joined_at,
        }
    }
}

impl GameSession {
    /// Document persisted for this session while in `phase`.
    pub fn to_entity(&self, phase: SessionPhase) -> SessionEntity {
        SessionEntity {
            pin: self.pin.clone(),
            status: phase.into(),
            quiz: (&self.quiz).into(),
            current_question_index: self.current_question_index,
            question_started_at: self.question_started_at,
            players: self.players.values().map(PlayerEntity::from).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<SessionEntity> for GameSession {
    /// Rebuild a session from its stored document; the countdown clock is not restored.
    fn from(entity: SessionEntity) -> Self {
        Self {
            pin: entity.pin,
            quiz: entity.quiz.into(),
            players: entity
                .players
                .into_iter()
                .map(|player| (player.id, Player::from(player)))
                .collect(),
            current_question_index: entity.current_question_index,
            question_started_at: entity.question_started_at,
            question_clock: None,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            last_activity: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: usize, time_limit_secs: u32) -> Question {
        Question {
            text: "Capital of France?".into(),
            options: (0..OPTIONS_PER_QUESTION)
                .map(|index| AnswerOption {
                    text: format!("option {index}"),
                    is_correct: index == correct,
                })
                .collect(),
            time_limit_secs,
        }
    }

    fn session() -> GameSession {
        GameSession::new(
            "123456".into(),
            Quiz {
                title: "Geography".into(),
                questions: vec![question(1, 20), question(3, 10)],
            },
        )
    }

    #[test]
    fn players_are_found_by_trimmed_name() {
        let mut game = session();
        let alice = game.add_player("  Alice ", 10).unwrap();
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.score, 0);
        assert_eq!(game.find_player_by_name(" Alice").map(|p| p.id), Some(alice.id));
        assert!(game.find_player_by_name("alice").is_none());
        assert!(game.find_player_by_name("bob").is_none());

        let emile = game.add_player("Émile", 10).unwrap();
        assert_eq!(game.find_player_by_name("Émile").map(|p| p.id), Some(emile.id));
        assert!(game.find_player_by_name("émile").is_none());
    }

    #[test]
    fn roster_is_capped() {
        let mut game = session();
        game.add_player("Alice", 1).unwrap();
        assert_eq!(
            game.add_player("Bob", 1).unwrap_err(),
            RosterError::RosterFull(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_scores_with_time_bonus() {
        let mut game = session();
        let alice = game.add_player("Alice", 10).unwrap();
        game.open_question(0);

        tokio::time::advance(std::time::Duration::from_millis(4_200)).await;
        let time_left = game.time_left_secs();
        assert_eq!(time_left, 16);
        let answer = game
            .record_answer(&ScoringRules::default(), alice.id, 0, 1, time_left)
            .unwrap();

        assert!(answer.correct);
        // 16 of 20 seconds left.
        assert_eq!(answer.points, 1400);
        assert_eq!(game.players[&alice.id].score, 1400);
        assert_eq!(game.answered_count(0), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_answer_per_question() {
        let mut game = session();
        let alice = game.add_player("Alice", 10).unwrap();
        game.open_question(0);
        let rules = ScoringRules::default();

        let first = game.record_answer(&rules, alice.id, 0, 0, 20).unwrap();
        assert!(!first.correct);
        assert_eq!(first.points, 0);
        assert_eq!(
            game.record_answer(&rules, alice.id, 0, 1, 20).unwrap_err(),
            RosterError::AlreadyAnswered(0)
        );
        assert_eq!(game.players[&alice.id].score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn answers_are_checked_against_open_question() {
        let mut game = session();
        let alice = game.add_player("Alice", 10).unwrap();
        game.open_question(1);
        let rules = ScoringRules::default();

        assert_eq!(
            game.record_answer(&rules, alice.id, 0, 1, 20).unwrap_err(),
            RosterError::WrongQuestion {
                expected: 1,
                got: 0
            }
        );
        assert_eq!(
            game.record_answer(&rules, alice.id, 1, 4, 10).unwrap_err(),
            RosterError::InvalidAnswerIndex(4)
        );
        let stranger = Uuid::new_v4();
        assert_eq!(
            game.record_answer(&rules, stranger, 1, 3, 10).unwrap_err(),
            RosterError::UnknownPlayer(stranger)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_answers_are_rejected() {
        let mut game = session();
        let alice = game.add_player("Alice", 10).unwrap();
        game.open_question(1);

        tokio::time::advance(std::time::Duration::from_secs(10)).await;
        assert_eq!(game.time_left_secs(), 0);
        assert_eq!(
            game.record_answer(&ScoringRules::default(), alice.id, 1, 3, game.time_left_secs())
                .unwrap_err(),
            RosterError::TimeUp(1)
        );
    }

    #[test]
    fn standings_sort_by_score_and_keep_join_order_on_ties() {
        let mut game = session();
        let alice = game.add_player("Alice", 10).unwrap();
        let bob = game.add_player("Bob", 10).unwrap();
        let carol = game.add_player("Carol", 10).unwrap();
        game.players.get_mut(&bob.id).unwrap().score = 1500;
        game.players.get_mut(&alice.id).unwrap().score = 1200;
        game.players.get_mut(&carol.id).unwrap().score = 1200;

        let standings = game.standings();
        let order = standings.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(order, ["Bob", "Alice", "Carol"]);
        assert_eq!(standings.iter().map(|s| s.rank).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn stored_document_restores_roster_and_quiz() {
        let mut game = session();
        let alice = game.add_player("Alice", 10).unwrap();
        game.add_player("Bob", 10).unwrap();
        game.players.get_mut(&alice.id).unwrap().score = 1250;
        game.open_question(1);

        let entity = game.to_entity(SessionPhase::Finished);
        assert_eq!(entity.status, SessionStatusEntity::Finished);
        assert_eq!(entity.players[0].name, "Alice");

        let restored = GameSession::from(entity);
        assert_eq!(restored.quiz, game.quiz);
        assert_eq!(restored.current_question_index, 1);
        assert_eq!(
            restored.players.keys().collect::<Vec<_>>(),
            game.players.keys().collect::<Vec<_>>()
        );
        assert_eq!(restored.players[&alice.id].score, 1250);
        assert!(restored.question_clock.is_none());
    }

    #[test]
    fn question_navigation() {
        let mut game = session();
        assert!(game.has_next_question());
        assert_eq!(game.current_question().unwrap().correct_indexes(), [1]);
        game.open_question(1);
        assert!(!game.has_next_question());
        assert!(game.question_started_at.is_some());
        assert_eq!(game.time_left_secs(), 10);
    }
}
