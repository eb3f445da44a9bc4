//! Transition and timer scheduling on an explicit clock.
//!
//! The timeline never reads a wall clock. Callers move it forward with
//! [`Timeline::advance`] and apply the returned [`Step`]s in order. Payloads
//! are opaque to the timeline; the caller decides what a transition animates.

use foundation::math::ease_cubic_in_out;
use foundation::time::{Time, TimeSpan};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionSpec {
    /// Starting a transition with a key already in flight interrupts the
    /// older one.
    pub key: Option<String>,
    pub delay_ms: f64,
    pub duration_ms: f64,
}

impl TransitionSpec {
    pub fn new(delay_ms: f64, duration_ms: f64) -> Self {
        Self {
            key: None,
            delay_ms,
            duration_ms,
        }
    }

    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// One thing that happened while the clock moved.
#[derive(Debug, PartialEq)]
pub enum Step<T> {
    /// The transition's delay elapsed.
    Start(TransitionId),
    /// Eased progress in `(0, 1)` at the new clock time.
    Tick(TransitionId, f64),
    /// The transition finished at the given time and was removed; its
    /// payload is handed back.
    End(TransitionId, Time, T),
    /// A repeating timer fired.
    Fire(TimerId),
}

struct Transition<T> {
    id: TransitionId,
    key: Option<String>,
    span: TimeSpan,
    started: bool,
    payload: T,
}

struct Timer<T> {
    id: TimerId,
    period_ms: f64,
    next_fire: Time,
    payload: T,
}

pub struct Timeline<T> {
    now: Time,
    /// Time new transitions and timers are scheduled from, when it is not
    /// `now`.
    origin: Option<Time>,
    next_id: u64,
    transitions: Vec<Transition<T>>,
    timers: Vec<Timer<T>>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            now: Time::ZERO,
            origin: None,
            next_id: 0,
            transitions: Vec::new(),
            timers: Vec::new(),
        }
    }

    pub fn now(&self) -> Time {
        self.now
    }

    /// Schedule from `at` instead of the clock, so that work started while
    /// playing a step late in a long advance keeps its place in time. `at`
    /// later than the clock is clamped to it.
    pub fn schedule_from(&mut self, at: Time) {
        self.origin = Some(if at.0 < self.now.0 { at } else { self.now });
    }

    /// Go back to scheduling from the clock.
    pub fn schedule_from_now(&mut self) {
        self.origin = None;
    }

    fn origin(&self) -> Time {
        self.origin.unwrap_or(self.now)
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Schedule a transition relative to the current clock, or to the time
    /// set with [`Timeline::schedule_from`].
    pub fn start(&mut self, spec: TransitionSpec, payload: T) -> TransitionId {
        let origin = self.origin();
        if let Some(key) = &spec.key {
            self.transitions.retain(|t| t.key.as_ref() != Some(key));
        }
        let id = TransitionId(self.allocate());
        self.transitions.push(Transition {
            id,
            key: spec.key,
            span: TimeSpan::new(origin.after(spec.delay_ms.max(0.0)), spec.duration_ms),
            started: false,
            payload,
        });
        id
    }

    /// Schedule a timer firing every `period_ms`, first one period from now.
    pub fn set_interval(&mut self, period_ms: f64, payload: T) -> TimerId {
        let origin = self.origin();
        let id = TimerId(self.allocate());
        // A zero period would fire forever within one advance.
        let period_ms = period_ms.max(1.0);
        self.timers.push(Timer {
            id,
            period_ms,
            next_fire: origin.after(period_ms),
            payload,
        });
        id
    }

    pub fn cancel(&mut self, id: TransitionId) -> Option<T> {
        let pos = self.transitions.iter().position(|t| t.id == id)?;
        Some(self.transitions.remove(pos).payload)
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> Option<T> {
        let pos = self.timers.iter().position(|t| t.id == id)?;
        Some(self.timers.remove(pos).payload)
    }

    /// Drop every transition and timer whose payload matches. Returns how many
    /// were dropped.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.transitions.len() + self.timers.len();
        self.transitions.retain(|t| !pred(&t.payload));
        self.timers.retain(|t| !pred(&t.payload));
        before - self.transitions.len() - self.timers.len()
    }

    pub fn payload(&self, id: TransitionId) -> Option<&T> {
        self.transitions
            .iter()
            .find(|t| t.id == id)
            .map(|t| &t.payload)
    }

    pub fn payload_mut(&mut self, id: TransitionId) -> Option<&mut T> {
        self.transitions
            .iter_mut()
            .find(|t| t.id == id)
            .map(|t| &mut t.payload)
    }

    pub fn timer_payload(&self, id: TimerId) -> Option<&T> {
        self.timers.iter().find(|t| t.id == id).map(|t| &t.payload)
    }

    pub fn timer_payload_mut(&mut self, id: TimerId) -> Option<&mut T> {
        self.timers
            .iter_mut()
            .find(|t| t.id == id)
            .map(|t| &mut t.payload)
    }

    pub fn is_active(&self, id: TransitionId) -> bool {
        self.transitions.iter().any(|t| t.id == id)
    }

    pub fn is_timer_active(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn is_idle(&self) -> bool {
        self.transitions.is_empty() && self.timers.is_empty()
    }

    /// True when something scheduled behind the clock has not been played
    /// yet, so advancing to the same time again would report new steps.
    pub fn has_due(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| !t.started && t.span.start.0 <= self.now.0)
            || self.timers.iter().any(|t| t.next_fire.0 <= self.now.0)
    }

    pub fn pending(&self) -> usize {
        self.transitions.len()
    }

    /// Move the clock to `now` and report what happened, ordered by the time
    /// each step occurred, then by scheduling order.
    ///
    /// Moving backwards is a no-op. Advancing to the current time again
    /// reports work scheduled behind the clock since the last advance, plus
    /// a repeated tick for transitions still running.
    pub fn advance(&mut self, now: Time) -> Vec<Step<T>> {
        if now.0 < self.now.0 {
            return Vec::new();
        }
        self.now = now;

        // (time, scheduling order, phase, step)
        let mut steps: Vec<(f64, u64, u8, Step<T>)> = Vec::new();

        let mut remaining = Vec::with_capacity(self.transitions.len());
        for mut t in self.transitions.drain(..) {
            if now.0 < t.span.start.0 {
                remaining.push(t);
                continue;
            }
            if !t.started {
                t.started = true;
                steps.push((t.span.start.0, t.id.0, 0, Step::Start(t.id)));
            }
            if now.0 >= t.span.end.0 {
                steps.push((t.span.end.0, t.id.0, 2, Step::End(t.id, t.span.end, t.payload)));
            } else {
                let eased = ease_cubic_in_out(t.span.progress(now));
                steps.push((now.0, t.id.0, 1, Step::Tick(t.id, eased)));
                remaining.push(t);
            }
        }
        self.transitions = remaining;

        for timer in &mut self.timers {
            while timer.next_fire.0 <= now.0 {
                steps.push((timer.next_fire.0, timer.id.0, 0, Step::Fire(timer.id)));
                timer.next_fire = timer.next_fire.after(timer.period_ms);
            }
        }

        steps.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        steps.into_iter().map(|(_, _, _, step)| step).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds<T>(steps: &[Step<T>]) -> Vec<String> {
        steps
            .iter()
            .map(|s| match s {
                Step::Start(id) => format!("start{}", id.0),
                Step::Tick(id, _) => format!("tick{}", id.0),
                Step::End(id, _, _) => format!("end{}", id.0),
                Step::Fire(id) => format!("fire{}", id.0),
            })
            .collect()
    }

    #[test]
    fn transition_waits_for_delay_then_ticks_and_ends() {
        let mut tl = Timeline::new();
        let id = tl.start(TransitionSpec::new(100.0, 750.0), "rotate");

        assert!(tl.advance(Time(50.0)).is_empty());

        let steps = tl.advance(Time(475.0));
        assert_eq!(kinds(&steps), vec!["start0", "tick0"]);
        let Step::Tick(_, t) = steps[1] else {
            panic!("expected tick");
        };
        assert!((t - 0.5).abs() < 1e-12);

        let steps = tl.advance(Time(900.0));
        assert_eq!(steps, vec![Step::End(id, Time(850.0), "rotate")]);
        assert!(tl.is_idle());
    }

    #[test]
    fn keyed_start_interrupts_previous() {
        let mut tl = Timeline::new();
        let a = tl.start(TransitionSpec::new(0.0, 100.0).keyed("map1"), 1);
        let b = tl.start(TransitionSpec::new(0.0, 100.0).keyed("map1"), 2);
        assert!(!tl.is_active(a));
        assert!(tl.is_active(b));
        assert_eq!(tl.pending(), 1);
    }

    #[test]
    fn timer_fires_each_period_in_time_order() {
        let mut tl = Timeline::new();
        let timer = tl.set_interval(500.0, "ticker");
        tl.start(TransitionSpec::new(600.0, 0.0), "flash");

        let steps = tl.advance(Time(1000.0));
        assert_eq!(kinds(&steps), vec!["fire0", "start1", "end1", "fire0"]);
        assert!(tl.is_timer_active(timer));

        assert_eq!(tl.cancel_timer(timer), Some("ticker"));
        assert!(tl.advance(Time(5000.0)).is_empty());
    }

    #[test]
    fn cancel_where_drops_matching_payloads() {
        let mut tl = Timeline::new();
        tl.start(TransitionSpec::new(0.0, 10.0), "layer-a");
        tl.start(TransitionSpec::new(0.0, 10.0), "layer-b");
        tl.set_interval(10.0, "layer-a");
        assert_eq!(tl.cancel_where(|p| *p == "layer-a"), 2);
        assert_eq!(tl.pending(), 1);
        assert_eq!(tl.payload(TransitionId(1)), Some(&"layer-b"));
    }

    #[test]
    fn work_chained_from_an_end_keeps_its_time() {
        let mut tl = Timeline::new();
        tl.start(TransitionSpec::new(100.0, 750.0), "zoom");
        let steps = tl.advance(Time(2000.0));
        let Some(Step::End(_, at, _)) = steps.last() else {
            panic!("expected an end");
        };
        assert_eq!(*at, Time(850.0));

        tl.schedule_from(*at);
        let chained = tl.start(TransitionSpec::new(100.0, 500.0), "sublayer");
        tl.set_interval(500.0, "ticker");
        tl.schedule_from_now();
        assert!(tl.has_due());

        // 950..1450 for the transition, 1350 and 1850 for the timer.
        let steps = tl.advance(Time(2000.0));
        assert_eq!(kinds(&steps), vec!["start1", "fire2", "end1", "fire2"]);
        assert!(!tl.is_active(chained));
        assert!(!tl.has_due());

        // Without an origin, scheduling is relative to the clock.
        tl.start(TransitionSpec::new(100.0, 0.0), "later");
        assert!(!tl.has_due());
    }

    #[test]
    fn clock_never_runs_backwards() {
        let mut tl: Timeline<()> = Timeline::new();
        tl.advance(Time(10.0));
        assert!(tl.advance(Time(5.0)).is_empty());
        assert_eq!(tl.now(), Time(10.0));
    }
}
