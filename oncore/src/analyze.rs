use crate::helpe::*;
use crate::machine::Allocation;

impl Engine {
    /// Checks that, on every core, busy allocations and the vacant ones
    /// still in the open pool tile [0, available) exactly: no overlaps,
    /// no holes, nothing past the available time.
    pub fn schedule_is_valid(&self) -> bool {
        let mut vacant: HashMap<CoreId, Vec<&Allocation>> = HashMap::new();
        for a in self.open.values() {
            vacant.entry(a.core).or_default().push(a);
        }

        for core in &self.cores {
            let mut cursor = 0;
            let tiles = core.schedule()
                .iter()
                .chain(vacant.remove(&core.id).unwrap_or_default())
                .sorted_by_key(|a| a.start);
            for a in tiles {
                if a.start != cursor || a.end <= a.start { return false; }
                cursor = a.end;
            }
            if cursor != core.available() { return false; }
        }

        // Vacant allocations pointing at no core.
        vacant.is_empty()
    }

    /// `true` if every accepted and placed job sits inside its window on
    /// exactly as many cores as it asked for.
    ///
    /// Preemptive placement may push earlier jobs past their due time,
    /// so this only holds for the non-preemptive policies.
    pub fn placements_meet_windows(&self) -> bool {
        for j in self.accepted() {
            let (Some(s), Some(c)) = (j.start, j.completion) else { continue; };
            if s < j.release || c > j.due { return false; }
            let cores_used = self.cores.iter()
                .filter(|core| core.fragments_of(j.id) > 0)
                .count();
            if cores_used != j.cores { return false; }
        }

        true
    }
}
