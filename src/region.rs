//! Upstream platforms (regions) a player can be looked up on.

// self
use crate::_prelude::*;

macro_rules! def_regions {
	($($variant:ident => ($id:literal, $platform:literal)),+ $(,)?) => {
		/// Game region; each maps to one upstream platform host.
		#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		pub enum Region {
			$(
				#[doc = concat!("`", $id, "` (platform `", $platform, "`).")]
				#[serde(rename = $id)]
				$variant,
			)+
		}
		impl Region {
			/// Every supported region, in display order.
			pub const ALL: &'static [Region] = &[$(Region::$variant),+];

			/// Short region identifier used in cache keys and leaderboard entries (e.g. `EUW`).
			pub const fn id(self) -> &'static str {
				match self {
					$(Region::$variant => $id,)+
				}
			}

			/// Platform identifier used to build upstream hostnames (e.g. `EUW1`).
			pub const fn platform_id(self) -> &'static str {
				match self {
					$(Region::$variant => $platform,)+
				}
			}

			/// Looks up a region by its short identifier.
			pub fn from_id(id: &str) -> Option<Self> {
				match id {
					$($id => Some(Region::$variant),)+
					_ => None,
				}
			}

			/// Looks up a region by its platform identifier.
			pub fn from_platform_id(platform: &str) -> Option<Self> {
				match platform {
					$($platform => Some(Region::$variant),)+
					_ => None,
				}
			}
		}
	};
}

def_regions! {
	Na => ("NA", "NA1"),
	Euw => ("EUW", "EUW1"),
	Eune => ("EUNE", "EUN1"),
	Br => ("BR", "BR1"),
	Oce => ("OCE", "OC1"),
	Kr => ("KR", "KR"),
	Tr => ("TR", "TR1"),
	Las => ("LAS", "LA2"),
	Lan => ("LAN", "LA1"),
	Ru => ("RU", "RU"),
	Jp => ("JP", "JP1"),
	Vn => ("VN", "VN2"),
	Ph => ("PH", "PH2"),
	Sg => ("SG", "SG2"),
	Tw => ("TW", "TW2"),
	Th => ("TH", "TH2"),
	Mena => ("MENA", "ME1"),
}

/// Error returned when a region identifier is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown region `{0}`.")]
pub struct UnknownRegion(pub String);

impl Display for Region {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.id())
	}
}
impl FromStr for Region {
	type Err = UnknownRegion;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let upper = s.trim().to_ascii_uppercase();

		Self::from_id(&upper)
			.or_else(|| Self::from_platform_id(&upper))
			.ok_or_else(|| UnknownRegion(s.to_owned()))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn ids_and_platforms_resolve_both_ways() {
		for region in Region::ALL {
			assert_eq!(Region::from_id(region.id()), Some(*region));
			assert_eq!(Region::from_platform_id(region.platform_id()), Some(*region));
		}

		assert_eq!("euw".parse::<Region>(), Ok(Region::Euw));
		assert_eq!("LA2".parse::<Region>(), Ok(Region::Las));
		assert!("moon".parse::<Region>().is_err());
	}

	#[test]
	fn serializes_as_short_id() {
		let json = serde_json::to_string(&Region::Oce).expect("Region should serialize.");

		assert_eq!(json, "\"OCE\"");
	}
}
