use chrono::NaiveTime;

use shared_models::schedule::{ScheduleBlock, TimeSlot};

/// Candidate slot starts for a set of blocks, in block order.
///
/// Each active block contributes every start `s` with
/// `s + service_duration <= block.end`, stepping by the service duration.
/// Clone before consuming to replay the sequence.
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    blocks: &'a [ScheduleBlock],
    duration: u32,
    block_index: usize,
    cursor: Option<u32>,
}

pub fn generate_slots(blocks: &[ScheduleBlock], service_duration_minutes: i32) -> Slots<'_> {
    Slots {
        blocks,
        duration: u32::try_from(service_duration_minutes).unwrap_or(0),
        block_index: 0,
        cursor: None,
    }
}

impl Iterator for Slots<'_> {
    type Item = TimeSlot;

    fn next(&mut self) -> Option<TimeSlot> {
        if self.duration == 0 {
            return None;
        }

        while let Some(block) = self.blocks.get(self.block_index) {
            if block.active {
                let start = self.cursor.unwrap_or_else(|| block.start_minute());
                if start + self.duration <= block.end_minute() {
                    self.cursor = Some(start + self.duration);
                    return NaiveTime::from_hms_opt(start / 60, start % 60, 0).map(TimeSlot::new);
                }
            }
            self.block_index += 1;
            self.cursor = None;
        }

        None
    }
}
