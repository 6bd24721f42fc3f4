//! Fuzz target: `Schedule::from_csv`
//!
//! Whatever decodes must re-encode to a canonical form that decodes to
//! the same schedule.
//!
//! cargo fuzz run fuzz_schedule_csv

#![no_main]

use feederlink::schedule::Schedule;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(schedule) = Schedule::from_csv(text) {
        let csv = schedule.to_csv();
        let again = Schedule::from_csv(&csv).expect("canonical CSV must decode");
        assert_eq!(again, schedule);
        assert_eq!(again.to_csv(), csv);
    }
});
