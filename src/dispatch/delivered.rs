use std::{
    collections::{HashSet, VecDeque},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

#[derive(Default)]
struct DeliveredState {
    order: VecDeque<(String, Instant)>,
    ids: HashSet<String>,
}

/// Помнит идентификаторы публикаций в течение окна `max_life`.
///
/// Брокер может доставить одно сообщение дважды (например, при
/// переподключении); повтор внутри окна отбрасывается.
pub struct DeliveredTracker {
    max_life: Duration,
    state: Mutex<DeliveredState>,
}

impl DeliveredTracker {
    pub fn new(max_life: Duration) -> Self {
        Self {
            max_life,
            state: Mutex::new(DeliveredState::default()),
        }
    }

    /// `true`, если публикация новая. Сообщения без идентификатора всегда
    /// считаются новыми.
    pub fn check_and_record(
        &self,
        publish_id: Option<&str>,
    ) -> bool {
        let Some(id) = publish_id.filter(|id| !id.is_empty()) else {
            return true;
        };

        let now = Instant::now();
        let mut state = self.state.lock();
        Self::evict(&mut state, now, self.max_life);

        if state.ids.contains(id) {
            return false;
        }
        state.ids.insert(id.to_string());
        state.order.push_back((id.to_string(), now));
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(
        state: &mut DeliveredState,
        now: Instant,
        max_life: Duration,
    ) {
        while let Some((id, at)) = state.order.front() {
            if now.duration_since(*at) < max_life {
                break;
            }
            state.ids.remove(id);
            state.order.pop_front();
        }
    }
}
