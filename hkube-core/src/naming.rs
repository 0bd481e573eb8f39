//! Random cluster names.

use rand::seq::SliceRandom;

const ADJECTIVES: &[&str] = &[
    "ancient", "bold", "brave", "bright", "calm", "clever", "cosmic", "crisp", "daring", "eager",
    "fancy", "fierce", "gentle", "golden", "happy", "hidden", "humble", "jolly", "keen", "lively",
    "lucky", "mellow", "misty", "noble", "proud", "quiet", "rapid", "silent", "snowy", "steady",
    "sunny", "swift", "tidy", "vivid", "wild", "witty",
];

const NOUNS: &[&str] = &[
    "anchor", "badger", "beacon", "canyon", "comet", "falcon", "forest", "glacier", "harbor",
    "heron", "island", "lantern", "meadow", "otter", "panda", "pebble", "pine", "planet", "raven",
    "river", "summit", "thunder", "tiger", "valley", "willow", "zephyr",
];

/// Generate an `adjective-noun-adjective` cluster name.
///
/// Names are lowercase ASCII with dashes so they remain valid server hostnames.
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let first = pick(ADJECTIVES, &mut rng);
    let noun = pick(NOUNS, &mut rng);
    let last = pick(ADJECTIVES, &mut rng);
    format!("{}-{}-{}", first, noun, last)
}

fn pick<R: rand::Rng>(words: &[&'static str], rng: &mut R) -> &'static str {
    words.choose(rng).copied().unwrap_or("cluster")
}
