// The player controlled worm: a head followed by a lagging chain of segments.

use super::entity::{Mover, Outbound, Outbox, Terminable};
use super::errors::InputError;
use super::packet::{Command, Packet, Payload};
use super::position::{Direction, Position};
use super::tuning::WormTuning;
use rand::Rng;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

struct WormState {
    // None until a client or the first tick picks a direction.
    direction: Option<Direction>,
    // Index 0 is the head.
    body: Vec<Position>,
}

pub struct Worm {
    boundary: i32,
    state: Mutex<WormState>,
    outbox: Mutex<Option<Outbox>>,
}

impl Worm {
    /// Creates a worm at the tuned spawn point with the tuned tail length.
    ///
    /// The returned receiver yields every packet broadcast to this worm and
    /// ends once the worm is killed and no playfield holds its outbox anymore.
    pub fn new(tuning: &WormTuning, outbox_capacity: usize) -> (Self, mpsc::Receiver<Packet>) {
        let (outbox_tx, outbox_rx) = mpsc::channel(outbox_capacity);
        let worm = Self {
            boundary: tuning.boundary,
            state: Mutex::new(WormState {
                direction: None,
                body: vec![tuning.spawn],
            }),
            outbox: Mutex::new(Some(outbox_tx)),
        };
        worm.extend(tuning.tail);
        (worm, outbox_rx)
    }

    fn state(&self) -> MutexGuard<'_, WormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox_slot(&self) -> MutexGuard<'_, Option<Outbox>> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn head(&self) -> Position {
        self.state().body[0]
    }

    /// Appends `segments` segments at the head position and returns the new body length.
    pub fn extend(&self, segments: usize) -> usize {
        let mut state = self.state();
        let head = state.body[0];
        state.body.extend(std::iter::repeat_n(head, segments));
        state.body.len()
    }

    /// Interprets one inbound packet.
    ///
    /// A `MOVE` towards the exact opposite of the current direction is ignored
    /// so a worm can never turn back into its own body.
    pub fn communicate(&self, packet: &Packet) -> Result<(), InputError> {
        match &packet.command {
            Command::Move => {
                let requested = match &packet.payload {
                    Payload::Token(token) => token.parse::<Direction>().ok(),
                    _ => None,
                };
                let Some(requested) = requested else {
                    return Err(InputError::InvalidPayload {
                        command: packet.command.to_string(),
                    });
                };

                let mut state = self.state();
                if state.direction == Some(requested.opposite()) {
                    debug!(%requested, "reversing direction rejected");
                } else {
                    state.direction = Some(requested);
                }
                Ok(())
            }
            Command::Hello => Ok(()),
            other => Err(InputError::UnknownCommand(other.to_string())),
        }
    }
}

impl Mover for Worm {
    fn direction(&self) -> Direction {
        let mut state = self.state();
        *state.direction.get_or_insert_with(|| {
            let pick = rand::thread_rng().gen_range(0..Direction::ALL.len());
            Direction::ALL[pick]
        })
    }

    fn step(&self, direction: Direction) {
        let boundary = self.boundary;
        let mut state = self.state();
        state.direction = Some(direction);

        // Every segment takes the place of the one before it; the old tail drops off.
        let head = state.body[0].stepped(direction, boundary);
        state.body.rotate_right(1);
        state.body[0] = head;
    }

    fn positions(&self) -> Vec<Position> {
        self.state().body.clone()
    }

    fn as_outbound(&self) -> Option<&dyn Outbound> {
        Some(self)
    }

    fn as_terminable(&self) -> Option<&dyn Terminable> {
        Some(self)
    }
}

impl Outbound for Worm {
    fn outbox(&self) -> Option<Outbox> {
        self.outbox_slot().clone()
    }
}

impl Terminable for Worm {
    fn kill(&self) {
        self.outbox_slot().take();
    }

    fn killed(&self) -> bool {
        self.outbox_slot().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worm() -> (Worm, mpsc::Receiver<Packet>) {
        Worm::new(&WormTuning::default(), 5)
    }

    fn short_worm(body: Vec<Position>) -> Worm {
        let (worm, _rx) = Worm::new(
            &WormTuning {
                tail: 0,
                ..WormTuning::default()
            },
            1,
        );
        worm.state().body = body;
        worm
    }

    #[test]
    fn when_created_then_body_is_head_plus_tail_stacked_on_spawn() {
        let (worm, _rx) = worm();
        let tuning = WormTuning::default();

        let positions = worm.positions();

        assert_eq!(positions.len(), tuning.tail + 1);
        assert!(positions.iter().all(|p| *p == tuning.spawn));
    }

    #[test]
    fn when_no_direction_was_set_then_one_is_picked_and_kept() {
        let (worm, _rx) = worm();

        let first = worm.direction();

        for _ in 0..10 {
            assert_eq!(worm.direction(), first);
        }
    }

    #[test]
    fn when_stepping_then_segments_follow_one_step_behind() {
        let p0 = Position::new(10, 10);
        let p1 = Position::new(11, 10);
        let p2 = Position::new(12, 10);
        let worm = short_worm(vec![p0, p1, p2]);

        worm.step(Direction::Up);

        assert_eq!(worm.positions(), vec![Position::new(10, 9), p0, p1]);
    }

    #[test]
    fn when_stepping_repeatedly_then_each_segment_holds_its_predecessors_previous_position() {
        let (worm, _rx) = worm();
        let origin = worm.head();

        let mut previous = worm.positions();
        for direction in [Direction::Left, Direction::Right, Direction::Up, Direction::Down] {
            worm.step(direction);
            assert_eq!(worm.direction(), direction);

            let current = worm.positions();
            assert_eq!(current.len(), previous.len());
            assert_eq!(&current[1..], &previous[..previous.len() - 1]);
            previous = current;
        }

        // Left, right, up, down brings the head back where it started.
        assert_eq!(worm.head(), origin);
    }

    #[test]
    fn when_stepping_into_the_boundary_then_head_is_clamped() {
        let worm = short_worm(vec![Position::new(0, 0), Position::new(1, 0)]);

        worm.step(Direction::Left);

        assert_eq!(worm.positions(), vec![Position::new(0, 0), Position::new(0, 0)]);
    }

    #[test]
    fn when_extending_then_new_segments_start_at_the_head() {
        let worm = short_worm(vec![Position::new(3, 4), Position::new(3, 5)]);

        let len = worm.extend(3);

        assert_eq!(len, 5);
        assert_eq!(&worm.positions()[2..], &[Position::new(3, 4); 3]);
    }

    #[test]
    fn when_move_requests_the_opposite_direction_then_it_is_ignored() {
        let (worm, _rx) = worm();
        worm.step(Direction::Right);

        worm.communicate(&Packet::movement("LEFT"))
            .expect("expected rejection to be silent");

        assert_eq!(worm.direction(), Direction::Right);
    }

    #[test]
    fn when_stepping_in_the_opposite_direction_then_it_is_applied() {
        let (worm, _rx) = worm();
        worm.step(Direction::Right);

        worm.step(Direction::Left);

        assert_eq!(worm.direction(), Direction::Left);
    }

    #[test]
    fn when_move_requests_a_perpendicular_direction_then_it_is_stored() {
        let (worm, _rx) = worm();
        worm.step(Direction::Right);

        worm.communicate(&Packet::movement("UP"))
            .expect("expected move to be accepted");
        assert_eq!(worm.direction(), Direction::Up);

        worm.communicate(&Packet::movement("DOWN"))
            .expect("expected rejection to be silent");
        assert_eq!(worm.direction(), Direction::Up);
    }

    #[test]
    fn when_move_payload_is_not_a_direction_then_returns_invalid_payload() {
        let (worm, _rx) = worm();
        worm.step(Direction::Down);

        for payload in [
            Payload::Empty,
            Payload::Token("NORTH".to_string()),
            Payload::Opaque("42".to_string()),
        ] {
            let result = worm.communicate(&Packet {
                command: Command::Move,
                payload,
            });
            assert!(matches!(result, Err(InputError::InvalidPayload { .. })));
        }
        assert_eq!(worm.direction(), Direction::Down);
    }

    #[test]
    fn when_hello_is_received_then_nothing_changes() {
        let (worm, _rx) = worm();
        worm.step(Direction::Left);
        let before = worm.positions();

        worm.communicate(&Packet::hello()).expect("expected hello to be accepted");

        assert_eq!(worm.direction(), Direction::Left);
        assert_eq!(worm.positions(), before);
    }

    #[test]
    fn when_command_is_unknown_then_returns_unknown_command() {
        let (worm, _rx) = worm();

        let result = worm.communicate(&Packet {
            command: Command::from("JUMP"),
            payload: Payload::Empty,
        });

        assert_eq!(result, Err(InputError::UnknownCommand("JUMP".to_string())));
    }

    #[tokio::test]
    async fn when_killed_then_outbox_closes_and_killed_reports_true() {
        let (worm, mut rx) = worm();
        assert!(!worm.killed());
        assert!(worm.outbox().is_some());

        worm.kill();
        worm.kill();

        assert!(worm.killed());
        assert!(worm.outbox().is_none());
        assert!(rx.recv().await.is_none());
    }
}
