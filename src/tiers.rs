use crate::data::{Episode, EpisodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRank {
    pub name: &'static str,
    pub css_class: &'static str,
    pub rgb: [u8; 3],
    pub dark_text: bool,
}

pub const TIER_RANKS: [TierRank; 6] = [
    TierRank { name: "S+", css_class: "bg-purple-600", rgb: [147, 51, 234], dark_text: false },
    TierRank { name: "S", css_class: "bg-amber-400", rgb: [251, 191, 36], dark_text: false },
    TierRank { name: "A", css_class: "bg-green-700", rgb: [21, 128, 61], dark_text: false },
    TierRank { name: "B", css_class: "bg-yellow-300", rgb: [253, 224, 71], dark_text: true },
    TierRank { name: "D", css_class: "bg-amber-500", rgb: [245, 158, 11], dark_text: false },
    TierRank { name: "F", css_class: "bg-red-600", rgb: [220, 38, 38], dark_text: false },
];

pub fn tier_rank(name: &str) -> Option<&'static TierRank> {
    TIER_RANKS.iter().find(|rank| rank.name == name)
}

/// Where an episode currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Tier(String),
    Unranked(u32),
}

const TIER_TAG: &str = "tier";
const UNRANKED_TAG: &str = "unranked";

/// Text form used for `data-drop-target` attributes.
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Tier(name) => write!(f, "{}:{}", TIER_TAG, name),
            Location::Unranked(season) => write!(f, "{}:{}", UNRANKED_TAG, season),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLocation(pub String);

impl FromStr for Location {
    type Err = InvalidLocation;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidLocation(input.to_string());
        let (tag, value) = input.split_once(':').ok_or_else(invalid)?;
        match tag {
            TIER_TAG if !value.is_empty() => Ok(Location::Tier(value.to_string())),
            UNRANKED_TAG => value.parse().map(Location::Unranked).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeMove {
    pub episode_id: EpisodeId,
    pub from: Location,
    pub to: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    SameLocation,
    /// The source no longer holds the episode.
    StaleSource,
    UnknownDestination,
}

/// Every episode of the loaded show, assigned to exactly one tier or
/// unranked season. Serializes as the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    #[serde(default)]
    pub tiers: BTreeMap<String, Vec<Episode>>,
    #[serde(default)]
    pub unranked_seasons: BTreeMap<u32, Vec<Episode>>,
}

impl Default for Partition {
    fn default() -> Self {
        Self {
            tiers: empty_tiers(),
            unranked_seasons: BTreeMap::new(),
        }
    }
}

fn empty_tiers() -> BTreeMap<String, Vec<Episode>> {
    TIER_RANKS
        .iter()
        .map(|rank| (rank.name.to_string(), Vec::new()))
        .collect()
}

fn sort_season(episodes: &mut [Episode]) {
    episodes.sort_by_key(|episode| episode.episode_number);
}

impl Partition {
    pub fn initialize(episodes: Vec<Episode>) -> Self {
        let mut unranked_seasons: BTreeMap<u32, Vec<Episode>> = BTreeMap::new();
        for episode in episodes {
            unranked_seasons
                .entry(episode.season_number)
                .or_default()
                .push(episode);
        }
        for season in unranked_seasons.values_mut() {
            sort_season(season);
        }

        Self {
            tiers: empty_tiers(),
            unranked_seasons,
        }
    }

    /// Takes a persisted snapshot as-is. Only missing tier keys are filled in.
    pub fn restore(snapshot: Partition) -> Self {
        let mut partition = snapshot;
        for rank in TIER_RANKS.iter() {
            partition.tiers.entry(rank.name.to_string()).or_default();
        }
        partition
    }

    pub fn tier(&self, name: &str) -> &[Episode] {
        self.tiers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn unranked(&self, season: u32) -> &[Episode] {
        self.unranked_seasons
            .get(&season)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn season_numbers(&self) -> Vec<u32> {
        self.unranked_seasons.keys().copied().collect()
    }

    pub fn has_unranked(&self) -> bool {
        self.unranked_seasons.values().any(|season| !season.is_empty())
    }

    pub fn episode_count(&self) -> usize {
        self.tiers.values().map(Vec::len).sum::<usize>()
            + self.unranked_seasons.values().map(Vec::len).sum::<usize>()
    }

    pub fn locate(&self, episode_id: EpisodeId) -> Option<Location> {
        let holds = |episodes: &Vec<Episode>| episodes.iter().any(|ep| ep.id == episode_id);
        self.tiers
            .iter()
            .find(|(_, episodes)| holds(episodes))
            .map(|(name, _)| Location::Tier(name.clone()))
            .or_else(|| {
                self.unranked_seasons
                    .iter()
                    .find(|(_, episodes)| holds(episodes))
                    .map(|(season, _)| Location::Unranked(*season))
            })
    }

    fn container(&self, location: &Location) -> Option<&Vec<Episode>> {
        match location {
            Location::Tier(name) => self.tiers.get(name),
            Location::Unranked(season) => self.unranked_seasons.get(season),
        }
    }

    fn container_mut(&mut self, location: &Location) -> Option<&mut Vec<Episode>> {
        match location {
            Location::Tier(name) => self.tiers.get_mut(name),
            Location::Unranked(season) => self.unranked_seasons.get_mut(season),
        }
    }

    /// Moves one episode between containers. Nothing changes unless the
    /// source holds the episode and the destination can accept it, so the
    /// partition never loses or duplicates an episode.
    pub fn move_episode(&mut self, request: &EpisodeMove) -> MoveOutcome {
        if request.from == request.to {
            return MoveOutcome::SameLocation;
        }

        if let Location::Tier(name) = &request.to {
            if tier_rank(name).is_none() && !self.tiers.contains_key(name) {
                return MoveOutcome::UnknownDestination;
            }
        }

        let Some(index) = self
            .container(&request.from)
            .and_then(|episodes| episodes.iter().position(|ep| ep.id == request.episode_id))
        else {
            return MoveOutcome::StaleSource;
        };

        let episode = match self.container_mut(&request.from) {
            Some(source) => source.remove(index),
            None => return MoveOutcome::StaleSource,
        };

        match &request.to {
            Location::Tier(name) => {
                self.tiers.entry(name.clone()).or_default().push(episode);
            }
            Location::Unranked(season) => {
                let bucket = self.unranked_seasons.entry(*season).or_default();
                bucket.push(episode);
                sort_season(bucket);
            }
        }

        MoveOutcome::Moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::episode;
    use std::collections::HashSet;

    fn ids(episodes: &[Episode]) -> Vec<EpisodeId> {
        episodes.iter().map(|ep| ep.id).collect()
    }

    fn all_ids(partition: &Partition) -> Vec<EpisodeId> {
        let mut ids: Vec<_> = partition
            .tiers
            .values()
            .chain(partition.unranked_seasons.values())
            .flat_map(|episodes| episodes.iter().map(|ep| ep.id))
            .collect();
        ids.sort_unstable();
        ids
    }

    fn tier(name: &str) -> Location {
        Location::Tier(name.to_string())
    }

    fn request(episode_id: EpisodeId, from: Location, to: Location) -> EpisodeMove {
        EpisodeMove { episode_id, from, to }
    }

    fn sample() -> Partition {
        Partition::initialize(vec![
            episode(13, 1, 3),
            episode(11, 1, 1),
            episode(12, 1, 2),
            episode(21, 2, 1),
            episode(22, 2, 2),
        ])
    }

    #[test]
    fn initialize_groups_by_season_sorted() {
        let partition = sample();
        assert_eq!(ids(partition.unranked(1)), vec![11, 12, 13]);
        assert_eq!(ids(partition.unranked(2)), vec![21, 22]);
        assert_eq!(partition.season_numbers(), vec![1, 2]);
        for rank in TIER_RANKS.iter() {
            assert!(partition.tier(rank.name).is_empty());
        }
    }

    #[test]
    fn unranked_to_tier() {
        let mut partition = Partition::initialize(vec![episode(1, 1, 1)]);
        let outcome = partition.move_episode(&request(1, Location::Unranked(1), tier("S")));

        assert_eq!(outcome, MoveOutcome::Moved);
        assert!(partition.unranked(1).is_empty());
        assert_eq!(ids(partition.tier("S")), vec![1]);
    }

    #[test]
    fn tier_back_to_unranked_resorts_bucket() {
        let mut partition = Partition::initialize(vec![
            episode(1, 1, 1),
            episode(2, 1, 2),
            episode(3, 1, 3),
            episode(5, 1, 5),
        ]);
        partition.move_episode(&request(5, Location::Unranked(1), tier("A")));
        partition.move_episode(&request(2, Location::Unranked(1), tier("A")));
        assert_eq!(ids(partition.tier("A")), vec![5, 2]);
        assert_eq!(ids(partition.unranked(1)), vec![1, 3]);

        partition.move_episode(&request(2, tier("A"), Location::Unranked(1)));

        assert_eq!(ids(partition.unranked(1)), vec![1, 2, 3]);
        assert_eq!(ids(partition.tier("A")), vec![5]);
    }

    #[test]
    fn same_location_is_noop() {
        let mut partition = sample();
        partition.move_episode(&request(11, Location::Unranked(1), tier("S")));
        let before = partition.clone();

        let outcome = partition.move_episode(&request(11, tier("S"), tier("S")));
        assert_eq!(outcome, MoveOutcome::SameLocation);
        assert_eq!(partition, before);

        let outcome =
            partition.move_episode(&request(12, Location::Unranked(1), Location::Unranked(1)));
        assert_eq!(outcome, MoveOutcome::SameLocation);
        assert_eq!(partition, before);
    }

    #[test]
    fn stale_source_leaves_partition_untouched() {
        let mut partition = sample();
        partition.move_episode(&request(21, Location::Unranked(2), tier("B")));
        let before = partition.clone();

        let outcome = partition.move_episode(&request(21, Location::Unranked(2), tier("S")));

        assert_eq!(outcome, MoveOutcome::StaleSource);
        assert_eq!(partition, before);
        assert_eq!(partition.locate(21), Some(tier("B")));
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let mut partition = sample();
        let before = partition.clone();
        let outcome = partition.move_episode(&request(11, Location::Unranked(1), tier("Z")));
        assert_eq!(outcome, MoveOutcome::UnknownDestination);
        assert_eq!(partition, before);
    }

    #[test]
    fn tiers_keep_drop_order() {
        let mut partition = sample();
        for id in [13, 11, 22] {
            let from = partition.locate(id).unwrap();
            partition.move_episode(&request(id, from, tier("S+")));
        }
        assert_eq!(ids(partition.tier("S+")), vec![13, 11, 22]);
    }

    #[test]
    fn moves_never_lose_or_duplicate_episodes() {
        let mut partition = sample();
        let expected = all_ids(&partition);
        let destinations = [
            tier("S+"),
            Location::Unranked(2),
            tier("F"),
            tier("A"),
            Location::Unranked(1),
            tier("D"),
            Location::Unranked(3),
        ];

        for step in 0..60usize {
            let episode_id = expected[step % expected.len()];
            let to = destinations[(step * 3 + 1) % destinations.len()].clone();
            // Alternate between the true source and a wrong one.
            let from = if step % 4 == 0 {
                tier("B")
            } else {
                partition.locate(episode_id).unwrap()
            };
            partition.move_episode(&request(episode_id, from, to));

            assert_eq!(all_ids(&partition), expected);
            let unique: HashSet<_> = all_ids(&partition).into_iter().collect();
            assert_eq!(unique.len(), expected.len());
            for season in partition.unranked_seasons.values() {
                assert!(season
                    .windows(2)
                    .all(|pair| pair[0].episode_number <= pair[1].episode_number));
            }
        }
        assert_eq!(partition.episode_count(), expected.len());
    }

    #[test]
    fn restore_fills_missing_tiers() {
        let mut snapshot = sample();
        snapshot.tiers.remove("F");
        let restored = Partition::restore(snapshot);
        assert!(restored.tiers.contains_key("F"));
        assert_eq!(restored.tiers.len(), TIER_RANKS.len());
    }

    #[test]
    fn has_unranked_tracks_empty_buckets() {
        let mut partition = Partition::initialize(vec![episode(1, 1, 1)]);
        assert!(partition.has_unranked());
        partition.move_episode(&request(1, Location::Unranked(1), tier("F")));
        assert!(!partition.has_unranked());
        assert_eq!(partition.season_numbers(), vec![1]);
    }

    #[test]
    fn location_text_form() {
        assert_eq!(tier("S+").to_string(), "tier:S+");
        assert_eq!(Location::Unranked(4).to_string(), "unranked:4");
        assert_eq!("tier:S+".parse::<Location>(), Ok(tier("S+")));
        assert_eq!("unranked:12".parse::<Location>(), Ok(Location::Unranked(12)));
        assert!("unranked:x".parse::<Location>().is_err());
        assert!("tier:".parse::<Location>().is_err());
        assert!("S".parse::<Location>().is_err());
    }
}
