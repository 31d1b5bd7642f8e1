use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Append-only write-ahead log of booking events.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` covers the bincode payload only, not the CRC.
/// - A truncated or corrupt trailing entry (crash mid-write) is discarded
///   on replay; everything before it is kept.
///
/// All appends go through the engine's single writer lock, so there is no
/// concurrent access to the underlying file.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_rewrite: u64,
}

fn write_entry(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

impl Wal {
    /// Open (or create) the log file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_rewrite: 0,
        })
    }

    /// Durably append one event: encode, flush, fsync.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        write_entry(&mut self.writer, event)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.appends_since_rewrite += 1;
        Ok(())
    }

    /// Appends since the log was last rewritten; drives the compaction
    /// threshold check.
    pub fn appends_since_rewrite(&self) -> u64 {
        self.appends_since_rewrite
    }

    /// Replace the log with a minimal event sequence recreating current
    /// state: write to a temp file, fsync, atomically rename over the log,
    /// then reopen the writer.
    pub fn rewrite(&mut self, events: &[Event]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for event in events {
                write_entry(&mut writer, event)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_rewrite = 0;
        Ok(())
    }

    /// Replay the log from disk, returning all intact events in order.
    /// A missing file is an empty history, not an error.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            let mut crc_buf = [0u8; 4];
            let truncated = read_or_eof(&mut reader, &mut payload)?
                || read_or_eof(&mut reader, &mut crc_buf)?;
            if truncated {
                break;
            }

            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break; // corrupt entry — stop replaying
            }
            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(_) => break, // corrupt payload
            }
        }

        Ok(events)
    }
}

/// Read exactly `buf.len()` bytes; `Ok(true)` means the file ended early.
fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(true),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Batch, Role, SeatType};
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("deskrota_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn seat_event() -> Event {
        Event::SeatAdded {
            id: Ulid::new(),
            seat_number: "A-01".into(),
            seat_type: SeatType::Designated,
            is_active: true,
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let events = vec![
            Event::EmployeeAdded {
                id: Ulid::new(),
                name: "Mina".into(),
                employee_id: "E100".into(),
                batch: Batch::One,
                squad: 3,
                role: Role::Employee,
            },
            seat_event(),
            Event::OverrideUpserted {
                week: 24,
                extra_floating_seats: 5,
                is_team_day: false,
            },
        ];

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
            assert_eq!(wal.appends_since_rewrite(), 3);
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_discards_truncated_tail() {
        let path = tmp_path("truncated.wal");
        let event = seat_event();
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }
        // Simulate a crash mid-append: partial length prefix plus garbage.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 5]).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("bad_crc.wal");
        let good = seat_event();
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        // Hand-write an entry whose CRC doesn't match its payload.
        {
            let payload = bincode::serialize(&seat_event()).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![good]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn rewrite_shrinks_and_resets_counter() {
        let path = tmp_path("rewrite.wal");
        let keeper = seat_event();
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&keeper).unwrap();
            // Churn: bookings confirmed and released many times over.
            for _ in 0..20 {
                let id = Ulid::new();
                wal.append(&Event::BookingConfirmed {
                    id,
                    employee: Ulid::new(),
                    seat: Ulid::new(),
                    day: "2025-06-09".parse().unwrap(),
                    booking_type: SeatType::Floating,
                    booked_at: "2025-06-08T15:00:00Z".parse().unwrap(),
                })
                .unwrap();
                wal.append(&Event::BookingReleased {
                    id,
                    released_at: "2025-06-08T16:00:00Z".parse().unwrap(),
                })
                .unwrap();
            }

            let before = fs::metadata(&path).unwrap().len();
            wal.rewrite(std::slice::from_ref(&keeper)).unwrap();
            assert_eq!(wal.appends_since_rewrite(), 0);
            let after = fs::metadata(&path).unwrap().len();
            assert!(after < before, "rewritten log should shrink: {after} < {before}");

            // Appending after a rewrite lands in the new file.
            wal.append(&seat_event()).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0], keeper);
        let _ = fs::remove_file(&path);
    }
}
