use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::{Index, IndexMut};
use std::path::Path;

use byteorder::{ReadBytesExt, WriteBytesExt, LE};

use crate::state::{State, STATE_SPACE_SIZE};
use crate::{Action, PersistError, NUM_ACTIONS};

/// Q-values of one state, in action-index order.
pub type QValues = [f64; NUM_ACTIONS];

pub const QTABLE_FORMAT_VERSION: u32 = 1;
pub const CSV_HEADER: &str =
    "player_total,dealer_card,usable_ace,Q_HIT,Q_STAND,Q_DOUBLE,Q_SPLIT,Q_SURRENDER";

const VISITED_WORDS: usize = STATE_SPACE_SIZE / 64;

/// Flat table of Q-values keyed by the packed state index, with a visited bit
/// per state. Reading a state that was never written yields the default row.
#[derive(Debug, Clone)]
pub struct QTable {
    rows: Vec<QValues>,
    visited: [u64; VISITED_WORDS],
    default_row: QValues,
}

impl Default for QTable {
    fn default() -> Self {
        QTable::with_default(0.0)
    }
}

impl QTable {
    pub fn new() -> QTable {
        QTable::default()
    }

    pub fn with_default(default_value: f64) -> QTable {
        QTable {
            rows: vec![[default_value; NUM_ACTIONS]; STATE_SPACE_SIZE],
            visited: [0; VISITED_WORDS],
            default_row: [default_value; NUM_ACTIONS],
        }
    }

    pub fn get(&self, state: &State, action: Action) -> f64 {
        self[state][action.index()]
    }

    pub fn set(&mut self, state: &State, action: Action, value: f64) {
        self[state][action.index()] = value;
    }

    pub fn get_all(&self, state: &State) -> QValues {
        self[state]
    }

    pub fn is_visited(&self, state: &State) -> bool {
        self.is_index_visited(state.index())
    }

    /// Best of the given actions; ties go to the one listed first.
    pub fn max_action(&self, state: &State, valid_actions: &[Action]) -> Option<Action> {
        let row = &self[state];
        let mut best: Option<(Action, f64)> = None;
        for &action in valid_actions {
            let q = row[action.index()];
            match best {
                Some((_, best_q)) if q <= best_q => {}
                _ => best = Some((action, q)),
            }
        }
        best.map(|(action, _)| action)
    }

    pub fn max_q(&self, state: &State, valid_actions: &[Action]) -> Option<f64> {
        self.max_action(state, valid_actions)
            .map(|action| self.get(state, action))
    }

    pub fn clear(&mut self) {
        for row in self.rows.iter_mut() {
            *row = self.default_row;
        }
        self.visited = [0; VISITED_WORDS];
    }

    /// Number of visited states.
    pub fn len(&self) -> usize {
        self.visited.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visited states in index order.
    pub fn visited_states(&self) -> impl Iterator<Item = State> + '_ {
        (0..STATE_SPACE_SIZE)
            .filter(|i| self.is_index_visited(*i))
            .map(State::from_index)
    }

    /// Writes `u32 version`, `u64 count`, then per visited state
    /// `i32 total, i32 dealer, u8 soft, u8 split, u8 double, 5 x f64`, all little-endian.
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> Result<(), PersistError> {
        writer.write_u32::<LE>(QTABLE_FORMAT_VERSION)?;
        writer.write_u64::<LE>(self.len() as u64)?;
        for state in self.visited_states() {
            writer.write_i32::<LE>(state.player_total as i32)?;
            writer.write_i32::<LE>(state.dealer_up_card as i32)?;
            writer.write_u8(state.soft as u8)?;
            writer.write_u8(state.can_split as u8)?;
            writer.write_u8(state.can_double as u8)?;
            for q in self.rows[state.index()] {
                writer.write_f64::<LE>(q)?;
            }
        }
        Ok(())
    }

    /// Replaces the content of this table with the records read. The default value is kept.
    pub fn read_binary<R: Read>(&mut self, reader: &mut R) -> Result<(), PersistError> {
        let version = reader.read_u32::<LE>().map_err(truncated)?;
        if version != QTABLE_FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(version));
        }
        let count = reader.read_u64::<LE>().map_err(truncated)?;
        if count > STATE_SPACE_SIZE as u64 {
            return Err(PersistError::Corrupt(format!("{} records exceed the state space", count)));
        }

        self.clear();
        for _ in 0..count {
            let player_total = reader.read_i32::<LE>().map_err(truncated)?;
            let dealer_up_card = reader.read_i32::<LE>().map_err(truncated)?;
            let soft = read_flag(reader)?;
            let can_split = read_flag(reader)?;
            let can_double = read_flag(reader)?;
            let mut row = [0.0; NUM_ACTIONS];
            for q in row.iter_mut() {
                *q = reader.read_f64::<LE>().map_err(truncated)?;
            }

            let state = State {
                player_total: u8::try_from(player_total).unwrap_or(0),
                dealer_up_card: u8::try_from(dealer_up_card).unwrap_or(0),
                soft,
                can_split,
                can_double,
            };
            if !state.is_valid() {
                return Err(PersistError::Corrupt(format!(
                    "record with player total {} and dealer card {}",
                    player_total, dealer_up_card
                )));
            }
            self[&state] = row;
        }
        Ok(())
    }

    pub fn save_to_binary(&self, path: &Path) -> Result<(), PersistError> {
        create_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_binary(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from_binary(&mut self, path: &Path) -> Result<(), PersistError> {
        let mut reader = BufReader::new(File::open(path)?);
        self.read_binary(&mut reader)
    }

    /// One row per visited state, values with 6 decimals.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{}", CSV_HEADER)?;
        for state in self.visited_states() {
            write!(
                writer,
                "{},{},{}",
                state.player_total, state.dealer_up_card, state.soft as u8
            )?;
            for q in self.rows[state.index()] {
                write!(writer, ",{:.6}", q)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), PersistError> {
        create_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn is_index_visited(&self, index: usize) -> bool {
        self.visited[index / 64] & (1 << (index % 64)) != 0
    }
}

impl Index<&State> for QTable {
    type Output = QValues;
    fn index(&self, state: &State) -> &Self::Output {
        let index = state.index();
        if self.is_index_visited(index) {
            &self.rows[index]
        } else {
            &self.default_row
        }
    }
}

impl IndexMut<&State> for QTable {
    /// Marks the state visited, starting from the default row on first access.
    fn index_mut(&mut self, state: &State) -> &mut Self::Output {
        let index = state.index();
        if !self.is_index_visited(index) {
            self.visited[index / 64] |= 1 << (index % 64);
            self.rows[index] = self.default_row;
        }
        &mut self.rows[index]
    }
}

pub(crate) fn create_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn read_flag<R: Read>(reader: &mut R) -> Result<bool, PersistError> {
    match reader.read_u8().map_err(truncated)? {
        0 => Ok(false),
        1 => Ok(true),
        x => Err(PersistError::Corrupt(format!("flag byte {}", x))),
    }
}

fn truncated(err: io::Error) -> PersistError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        PersistError::Corrupt(String::from("unexpected end of file"))
    } else {
        PersistError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> QTable {
        let mut table = QTable::new();
        table.set(&State::new(16, 10, false), Action::Hit, -0.42);
        table.set(&State::new(16, 10, false), Action::Surrender, -0.5);
        table.set(&State::new(18, 1, true), Action::Stand, 0.1234567891);
        let state = State {
            player_total: 8,
            dealer_up_card: 6,
            soft: false,
            can_split: true,
            can_double: true,
        };
        table.set(&state, Action::Split, 0.25);
        table
    }

    #[test]
    fn unvisited_states_read_the_default() {
        let table = QTable::with_default(0.5);
        let state = State::new(12, 3, false);
        assert_eq!(table.get(&state, Action::Hit), 0.5);
        assert_eq!(table.get_all(&state), [0.5; NUM_ACTIONS]);
        assert!(!table.is_visited(&state));
        assert!(table.is_empty());
    }

    #[test]
    fn set_marks_visited_and_initialises_row() {
        let mut table = QTable::with_default(-1.0);
        let state = State::new(12, 3, false);
        table.set(&state, Action::Stand, 0.3);
        assert!(table.is_visited(&state));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get_all(&state), [-1.0, 0.3, -1.0, -1.0, -1.0]);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.get(&state, Action::Stand), -1.0);
    }

    #[test]
    fn max_action_breaks_ties_by_order() {
        let mut table = QTable::new();
        let state = State::new(13, 2, false);
        assert_eq!(
            table.max_action(&state, &[Action::Stand, Action::Hit]),
            Some(Action::Stand)
        );
        assert_eq!(
            table.max_action(&state, &[Action::Hit, Action::Stand]),
            Some(Action::Hit)
        );
        table.set(&state, Action::Double, 0.2);
        assert_eq!(
            table.max_action(&state, &[Action::Hit, Action::Stand]),
            Some(Action::Hit)
        );
        assert_eq!(
            table.max_action(&state, &[Action::Hit, Action::Stand, Action::Double]),
            Some(Action::Double)
        );
        assert_eq!(table.max_q(&state, &[Action::Hit, Action::Double]), Some(0.2));
        assert_eq!(table.max_action(&state, &[]), None);
    }

    #[test]
    fn binary_round_trip_is_exact() {
        let table = sample_table();
        let mut bytes = Vec::new();
        table.write_binary(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 + 8 + 3 * (4 + 4 + 3 + 8 * NUM_ACTIONS));
        assert_eq!(&bytes[..4], &[1, 0, 0, 0]);

        let mut loaded = QTable::new();
        loaded.read_binary(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.len(), table.len());
        for state in table.visited_states() {
            assert!(loaded.is_visited(&state));
            for (a, b) in table.get_all(&state).iter().zip(loaded.get_all(&state).iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn rejects_other_versions() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LE>(2).unwrap();
        bytes.write_u64::<LE>(0).unwrap();
        let mut table = QTable::new();
        assert!(matches!(
            table.read_binary(&mut bytes.as_slice()),
            Err(PersistError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn rejects_truncated_files() {
        let mut bytes = Vec::new();
        sample_table().write_binary(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        let mut table = QTable::new();
        assert!(matches!(
            table.read_binary(&mut bytes.as_slice()),
            Err(PersistError::Corrupt(_))
        ));
    }

    #[test]
    fn save_and_load_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent.qtable");
        let table = sample_table();
        table.save_to_binary(&path).unwrap();

        let mut loaded = QTable::new();
        loaded.load_from_binary(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(
            loaded.get(&State::new(16, 10, false), Action::Hit),
            -0.42
        );
    }

    #[test]
    fn csv_lists_visited_states() {
        let mut out = Vec::new();
        sample_table().write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"16,10,0,-0.420000,0.000000,0.000000,0.000000,-0.500000"));
        assert!(lines.contains(&"18,1,1,0.000000,0.123457,0.000000,0.000000,0.000000"));
    }
}
