//! Random run names (`adjective-noun-NNNN`)

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "daring", "eager", "fuzzy", "gentle", "hazy", "icy", "jolly",
    "keen", "lucid", "mellow", "nimble", "odd", "proud", "quiet", "rapid", "sly", "tidy",
    "upbeat", "vivid", "witty", "young", "zesty",
];

const NOUNS: &[&str] = &[
    "badger", "comet", "delta", "ember", "falcon", "glacier", "harbor", "island", "jaguar",
    "kernel", "lantern", "meadow", "nebula", "otter", "pebble", "quartz", "raven", "summit",
    "tundra", "umbra", "valley", "willow", "xenon", "yak", "zephyr",
];

/// Generate a run name such as `brisk-otter-0427`.
#[must_use]
pub fn random_run_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("otter");
    let suffix: u16 = rng.gen_range(0..10_000);
    format!("{adjective}-{noun}-{suffix:04}")
}
