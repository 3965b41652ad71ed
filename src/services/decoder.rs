// src/services/decoder.rs

//! Grid decoder.
//!
//! Turns the raw classroom assignment grid into [`Room`] records. The layout is
//! positional and horizontal: every room lives on a single row, its identity in
//! columns 1..=4 and its week in 5 days x 14 slots starting at column 5.
//!
//! ```text
//! col:  0   1    2     3     4      5 .. 18   19 .. 32   ...   61 .. 74
//!       -   NO   EDIF  AULA  CUPO   monday    tuesday          friday
//! ```

use chrono::Utc;

use crate::models::{DaySchedule, Room, RoomSchedule, SLOTS_PER_DAY, TIME_SLOTS, TimeSlot, Weekday};

/// Positional constants of the sheet template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    /// First row that may hold a room (earlier rows are template headers)
    pub first_room_row: usize,
    /// Column of the room number; building, name and capacity follow it
    pub identity_column: usize,
    /// Column of Monday's first slot
    pub schedule_column: usize,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            first_room_row: 7,
            identity_column: 1,
            schedule_column: 5,
        }
    }
}

impl GridLayout {
    /// Column holding the cell for a day and slot.
    pub fn slot_column(&self, day: Weekday, slot_index: usize) -> usize {
        self.schedule_column + day.index() * SLOTS_PER_DAY + slot_index
    }
}

/// Why a row did not produce a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The row has no cells or only whitespace
    Blank,
    MissingNumber,
    MissingBuilding,
    MissingName,
}

/// Outcome of decoding a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Room(Room),
    Skip(SkipReason),
}

/// Rooms decoded from one pass plus how many rows were skipped.
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub rooms: Vec<Room>,
    pub rows_scanned: usize,
    pub rows_skipped: usize,
}

/// Room identity read from the header columns.
struct RoomHeader {
    number: String,
    building: String,
    name: String,
    capacity: u32,
}

/// Decoder for the classroom grid template.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridDecoder {
    layout: GridLayout,
}

impl GridDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every room in the grid, in row order.
    pub fn decode(&self, grid: &[Vec<String>]) -> Vec<Room> {
        self.decode_report(grid).rooms
    }

    /// Decode every room and keep skip statistics.
    pub fn decode_report(&self, grid: &[Vec<String>]) -> DecodeReport {
        log::debug!("Decoding grid with {} rows", grid.len());

        let mut report = DecodeReport::default();
        for (row_index, row) in grid.iter().enumerate().skip(self.layout.first_room_row) {
            report.rows_scanned += 1;
            match self.decode_row(row) {
                RowOutcome::Room(room) => {
                    log::debug!(
                        "Row {}: {} with {} occupied slots",
                        row_index,
                        room.label(),
                        room.schedule.occupied_count()
                    );
                    report.rooms.push(room);
                }
                RowOutcome::Skip(reason) => {
                    report.rows_skipped += 1;
                    if reason != SkipReason::Blank {
                        log::debug!("Row {} skipped: {:?}", row_index, reason);
                    }
                }
            }
        }

        log::info!(
            "Decoded {} rooms ({} rows scanned, {} skipped)",
            report.rooms.len(),
            report.rows_scanned,
            report.rows_skipped
        );
        report
    }

    /// Decode one row into a room, or explain why it is not a room header.
    pub fn decode_row(&self, row: &[String]) -> RowOutcome {
        let header = match self.read_header(row) {
            Ok(header) => header,
            Err(reason) => return RowOutcome::Skip(reason),
        };

        let schedule = RoomSchedule::from_fn(|day| self.decode_day(row, day));

        RowOutcome::Room(Room {
            number: header.number,
            building: header.building,
            name: header.name,
            capacity: header.capacity,
            schedule,
            last_decoded_at: Utc::now(),
        })
    }

    fn read_header(&self, row: &[String]) -> Result<RoomHeader, SkipReason> {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            return Err(SkipReason::Blank);
        }

        let col = self.layout.identity_column;
        let number = cell(row, col).trim();
        let building = cell(row, col + 1).trim();
        let name = cell(row, col + 2).trim();

        if number.is_empty() {
            return Err(SkipReason::MissingNumber);
        }
        if building.is_empty() {
            return Err(SkipReason::MissingBuilding);
        }
        if name.is_empty() {
            return Err(SkipReason::MissingName);
        }

        Ok(RoomHeader {
            number: number.to_string(),
            building: building.to_string(),
            name: name.to_string(),
            capacity: parse_capacity(cell(row, col + 3)),
        })
    }

    fn decode_day(&self, row: &[String], day: Weekday) -> DaySchedule {
        let slots = TIME_SLOTS
            .iter()
            .enumerate()
            .map(|(slot_index, (start, end))| {
                let content = cell(row, self.layout.slot_column(day, slot_index));
                parse_slot(content, start, end)
            })
            .collect();
        DaySchedule::new(slots)
    }
}

/// Cell text, or an empty string when the row is too short.
fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// Parse a capacity cell; anything that is not a non-negative integer becomes 0.
pub fn parse_capacity(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}

/// Parse one schedule cell.
///
/// Lines are positional: program, subject, then professor. Lines past the
/// third are joined onto the professor with spaces. A single line is a program.
pub fn parse_slot(content: &str, start_time: &str, end_time: &str) -> TimeSlot {
    let content = content.trim();
    if content.is_empty() {
        return TimeSlot::empty(start_time, end_time);
    }

    let lines: Vec<&str> = content.lines().collect();
    let program = lines.first().copied().unwrap_or("");
    let subject = lines.get(1).copied().unwrap_or("");
    let professor = lines.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();

    TimeSlot {
        start_time: start_time.to_string(),
        end_time: end_time.to_string(),
        subject: subject.to_string(),
        professor,
        program: program.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Width of a fully populated room row.
    const ROW_WIDTH: usize = 5 + 5 * SLOTS_PER_DAY;

    fn template_rows() -> Vec<Vec<String>> {
        (0..7).map(|i| vec![format!("header {i}")]).collect()
    }

    fn room_row(number: &str, building: &str, name: &str, capacity: &str) -> Vec<String> {
        let mut row = vec![String::new(); ROW_WIDTH];
        row[1] = number.to_string();
        row[2] = building.to_string();
        row[3] = name.to_string();
        row[4] = capacity.to_string();
        row
    }

    fn grid_with(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let mut grid = template_rows();
        grid.extend(rows);
        grid
    }

    #[test]
    fn test_single_empty_room() {
        let grid = grid_with(vec![room_row("101", "A", "Room A", "30")]);
        let rooms = GridDecoder::new().decode(&grid);

        assert_eq!(rooms.len(), 1);
        let room = &rooms[0];
        assert_eq!(room.number, "101");
        assert_eq!(room.building, "A");
        assert_eq!(room.name, "Room A");
        assert_eq!(room.capacity, 30);

        let total: usize = room.schedule.days().map(|(_, d)| d.len()).sum();
        assert_eq!(total, 70);
        assert_eq!(room.schedule.occupied_count(), 0);
    }

    #[test]
    fn test_header_rows_never_inspected() {
        let mut grid = vec![room_row("1", "B", "Hidden", "10"); 7];
        grid.push(room_row("2", "B", "Visible", "10"));
        let rooms = GridDecoder::new().decode(&grid);
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "Visible");
    }

    #[test]
    fn test_skip_rows_without_identity() {
        let mut partial = room_row("102", "", "", "20");
        partial[5] = "PROG\nSUBJ\nPROF".to_string();

        let grid = grid_with(vec![
            vec![],
            vec!["  ".to_string(); 4],
            partial,
            room_row("", "A", "No number", "5"),
            room_row("103", "A", "  ", "5"),
            room_row("104", "A", "Kept", "5"),
        ]);
        let report = GridDecoder::new().decode_report(&grid);

        assert_eq!(report.rooms.len(), 1);
        assert_eq!(report.rooms[0].number, "104");
        assert_eq!(report.rows_scanned, 6);
        assert_eq!(report.rows_skipped, 5);
    }

    #[test]
    fn test_skip_reasons() {
        let decoder = GridDecoder::new();
        assert_eq!(decoder.decode_row(&[]), RowOutcome::Skip(SkipReason::Blank));
        assert_eq!(
            decoder.decode_row(&room_row("", "A", "N", "1")),
            RowOutcome::Skip(SkipReason::MissingNumber)
        );
        assert_eq!(
            decoder.decode_row(&room_row("1", " ", "N", "1")),
            RowOutcome::Skip(SkipReason::MissingBuilding)
        );
        assert_eq!(
            decoder.decode_row(&room_row("1", "A", "", "1")),
            RowOutcome::Skip(SkipReason::MissingName)
        );
    }

    #[test]
    fn test_identity_fields_are_trimmed() {
        let grid = grid_with(vec![room_row(" 7B ", " C ", " Lab ", " 25 ")]);
        let room = &GridDecoder::new().decode(&grid)[0];
        assert_eq!(room.number, "7B");
        assert_eq!(room.building, "C");
        assert_eq!(room.name, "Lab");
        assert_eq!(room.capacity, 25);
    }

    #[test]
    fn test_unparsable_capacity_defaults_to_zero() {
        assert_eq!(parse_capacity("—"), 0);
        assert_eq!(parse_capacity("thirty"), 0);
        assert_eq!(parse_capacity(""), 0);
        assert_eq!(parse_capacity("-4"), 0);
        assert_eq!(parse_capacity("40"), 40);

        let grid = grid_with(vec![room_row("101", "A", "Room A", "—")]);
        let rooms = GridDecoder::new().decode(&grid);
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].capacity, 0);
    }

    #[test]
    fn test_short_row_yields_full_schedule() {
        let row: Vec<String> = ["", "101", "A", "Room A"].iter().map(|s| s.to_string()).collect();
        let rooms = GridDecoder::new().decode(&grid_with(vec![row]));

        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].capacity, 0);
        for (_, day) in rooms[0].schedule.days() {
            assert_eq!(day.len(), SLOTS_PER_DAY);
            for (slot, (start, end)) in day.slots().iter().zip(TIME_SLOTS.iter()) {
                assert_eq!(slot.start_time, *start);
                assert_eq!(slot.end_time, *end);
                assert!(slot.is_empty());
            }
        }
    }

    #[test]
    fn test_slot_column_formula() {
        let layout = GridLayout::default();
        assert_eq!(layout.slot_column(Weekday::Monday, 0), 5);
        assert_eq!(layout.slot_column(Weekday::Monday, 13), 18);
        assert_eq!(layout.slot_column(Weekday::Tuesday, 0), 19);
        assert_eq!(layout.slot_column(Weekday::Friday, 13), 74);
    }

    #[test]
    fn test_cells_land_on_their_day_and_interval() {
        let layout = GridLayout::default();
        let mut row = room_row("101", "A", "Room A", "30");
        row[layout.slot_column(Weekday::Wednesday, 2)] = "PROGX\nALGEBRA\nDR. SMITH".to_string();
        row[layout.slot_column(Weekday::Friday, 13)] = "LATE".to_string();

        let room = &GridDecoder::new().decode(&grid_with(vec![row]))[0];

        let slot = &room.schedule.wednesday.slots()[2];
        assert_eq!(slot.start_time, "09:00");
        assert_eq!(slot.end_time, "10:00");
        assert_eq!(slot.program, "PROGX");
        assert_eq!(slot.subject, "ALGEBRA");
        assert_eq!(slot.professor, "DR. SMITH");

        let late = &room.schedule.friday.slots()[13];
        assert_eq!(late.start_time, "20:00");
        assert_eq!(late.program, "LATE");
        assert_eq!(room.schedule.occupied_count(), 2);
    }

    #[test]
    fn test_parse_slot_three_lines() {
        let slot = parse_slot("PROGX\nALGEBRA\nDR. SMITH", "07:00", "08:00");
        assert_eq!(slot.program, "PROGX");
        assert_eq!(slot.subject, "ALGEBRA");
        assert_eq!(slot.professor, "DR. SMITH");
        assert_eq!(slot.start_time, "07:00");
        assert_eq!(slot.end_time, "08:00");
    }

    #[test]
    fn test_parse_slot_single_line_is_program() {
        let slot = parse_slot("ONLYPROGRAM", "08:00", "09:00");
        assert_eq!(slot.program, "ONLYPROGRAM");
        assert_eq!(slot.subject, "");
        assert_eq!(slot.professor, "");
    }

    #[test]
    fn test_parse_slot_two_lines() {
        let slot = parse_slot("PROG\nSUBJECT", "08:00", "09:00");
        assert_eq!(slot.program, "PROG");
        assert_eq!(slot.subject, "SUBJECT");
        assert_eq!(slot.professor, "");
    }

    #[test]
    fn test_parse_slot_extra_lines_join_professor() {
        let slot = parse_slot("PROG\nSUBJ\nDR. A\nDR. B", "10:00", "11:00");
        assert_eq!(slot.professor, "DR. A DR. B");
    }

    #[test]
    fn test_parse_slot_blank_content() {
        for content in ["", "   ", "\n\t\n"] {
            let slot = parse_slot(content, "12:00", "13:00");
            assert!(slot.is_empty());
            assert_eq!(slot.start_time, "12:00");
            assert_eq!(slot.end_time, "13:00");
        }
    }

    #[test]
    fn test_parse_slot_crlf_and_outer_whitespace() {
        let slot = parse_slot("  PROG\r\nSUBJ\r\nPROF  ", "07:00", "08:00");
        assert_eq!(slot.program, "PROG");
        assert_eq!(slot.subject, "SUBJ");
        assert_eq!(slot.professor, "PROF");
    }

    #[test]
    fn test_rooms_keep_grid_order() {
        let grid = grid_with(vec![
            room_row("300", "C", "Third", "1"),
            room_row("100", "A", "First", "1"),
            room_row("200", "B", "Second", "1"),
        ]);
        let numbers: Vec<_> = GridDecoder::new()
            .decode(&grid)
            .into_iter()
            .map(|r| r.number)
            .collect();
        assert_eq!(numbers, vec!["300", "100", "200"]);
    }

    #[test]
    fn test_grid_shorter_than_header_block() {
        let grid = template_rows();
        let report = GridDecoder::new().decode_report(&grid);
        assert!(report.rooms.is_empty());
        assert_eq!(report.rows_scanned, 0);
    }
}
