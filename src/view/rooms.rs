use std::collections::HashMap;

use crate::feed::MessageRecord;

#[derive(Debug, Clone)]
pub struct RoomActivity {
    pub room_number: String,
    pub message_count: usize,
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

/// Room numbers seen in the feed, for the side panel.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<String, RoomActivity>,
}

impl RoomDirectory {
    pub fn record(&mut self, record: &MessageRecord) {
        let room = self
            .rooms
            .entry(record.room_number.clone())
            .or_insert_with(|| RoomActivity {
                room_number: record.room_number.clone(),
                message_count: 0,
                last_activity: record.created_at,
            });
        room.message_count += 1;
        if record.created_at > room.last_activity {
            room.last_activity = record.created_at;
        }
    }

    pub fn message_count(&self, room_number: &str) -> usize {
        self.rooms.get(room_number).map_or(0, |r| r.message_count)
    }

    /// Most recently active first.
    pub fn list(&self) -> Vec<&RoomActivity> {
        let mut rooms: Vec<&RoomActivity> = self.rooms.values().collect();
        rooms.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.room_number.cmp(&b.room_number))
        });
        rooms
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, room: &str, secs: i64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            author_name: "a".to_string(),
            author_photo_url: None,
            text: "t".to_string(),
            room_number: room.to_string(),
            created_at: chrono::DateTime::from_timestamp(secs, 0).unwrap(),
        }
    }

    #[test]
    fn counts_and_orders_by_activity() {
        let mut rooms = RoomDirectory::default();
        rooms.record(&record("1", "1", 10));
        rooms.record(&record("2", "2", 20));
        rooms.record(&record("3", "1", 30));

        assert_eq!(rooms.message_count("1"), 2);
        assert_eq!(rooms.message_count("9"), 0);
        let order: Vec<&str> = rooms.list().iter().map(|r| r.room_number.as_str()).collect();
        assert_eq!(order, vec!["1", "2"]);
    }
}
