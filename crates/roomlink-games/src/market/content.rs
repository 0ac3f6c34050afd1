//! Flavor content for the market: company listings and news events.
//!
//! The resolution rules only care about numbers (shares, impacts,
//! durations) and which instruments an event targets. Names and
//! headlines come from the two traits here, so a deployment can plug in
//! its own tables. The defaults are small and neutral.

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};

use super::{EventKind, EventTarget, MarketEvent, Scope, Stock};

/// A company to list at the start of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    pub sector: String,
    pub shares: u64,
}

/// Supplies the instruments a new game lists.
pub trait ListingSource: Send + Sync + 'static {
    /// Returns `count` listings with distinct names.
    fn listings(&self, count: usize, rng: &mut StdRng) -> Vec<Listing>;
}

/// Supplies market news.
pub trait EventSource: Send + Sync + 'static {
    /// Draws one event aimed at the given instruments. `round` is the
    /// round the event is drawn in.
    fn draw(&self, stocks: &[Stock], round: u32, rng: &mut StdRng) -> Option<MarketEvent>;
}

// ---------------------------------------------------------------------------
// Default listings
// ---------------------------------------------------------------------------

const PREFIXES: &[&str] = &[
    "Apex", "Blue River", "Quantum", "Northstar", "Summit", "Horizon", "Crescent", "Ironwood",
    "Silverline", "Evergreen", "Nova", "Pioneer", "Golden Gate", "Red Rock", "Skyward",
];

/// Name suffix and the sector it places the company in.
const SUFFIXES: &[(&str, &str)] = &[
    ("Software", "Technology"),
    ("Aerospace", "Technology"),
    ("Networks", "Technology"),
    ("Semiconductor", "Semiconductors"),
    ("Chips", "Semiconductors"),
    ("Heavy Industries", "Industrials"),
    ("Machinery", "Industrials"),
    ("Instruments", "Industrials"),
    ("Bank", "Finance"),
    ("Securities", "Finance"),
    ("Insurance", "Finance"),
    ("Biotech", "Healthcare"),
    ("Pharma", "Healthcare"),
    ("Foods", "Consumer"),
    ("Retail", "Consumer"),
    ("Power", "Energy"),
    ("Solar", "Energy"),
    ("Chemicals", "Energy"),
    ("Properties", "Real Estate"),
    ("Building Materials", "Construction"),
    ("Infrastructure", "Construction"),
    ("Agritech", "Agriculture"),
    ("Defense Systems", "Defense"),
    ("Logistics", "Transport"),
    ("Ports", "Transport"),
];

/// Prefix × suffix name generator.
///
/// Share counts are drawn from `100_000..1_000_000` in steps of 10 000.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameTable;

impl ListingSource for NameTable {
    fn listings(&self, count: usize, rng: &mut StdRng) -> Vec<Listing> {
        let mut combos: Vec<(&str, &str, &str)> = PREFIXES
            .iter()
            .flat_map(|&p| SUFFIXES.iter().map(move |&(s, sector)| (p, s, sector)))
            .collect();
        combos.shuffle(rng);

        (0..count)
            .map(|i| {
                let (prefix, suffix, sector) = combos[i % combos.len()];
                let lap = i / combos.len();
                let name = if lap == 0 {
                    format!("{prefix} {suffix}")
                } else {
                    format!("{prefix} {suffix} {}", lap + 1)
                };
                Listing {
                    name,
                    sector: sector.to_string(),
                    shares: 100_000 + rng.random_range(0..90u64) * 10_000,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Default events
// ---------------------------------------------------------------------------

/// What a template aims at before a concrete target is picked.
#[derive(Debug, Clone, Copy)]
enum Aim {
    All,
    /// A fixed sector, or a random listed one.
    Sector(Option<&'static str>),
    /// A random instrument.
    Index,
    TempBanIndex,
    TempBanSector,
    BuyLimitSector,
}

#[derive(Debug, Clone, Copy)]
struct Template {
    message: &'static str,
    impact: Option<f64>,
    duration: u32,
    aim: Aim,
    limit_change: Option<i32>,
}

const fn news(message: &'static str, impact: f64, duration: u32, aim: Aim) -> Template {
    Template {
        message,
        impact: Some(impact),
        duration,
        aim,
        limit_change: None,
    }
}

const TEMPLATES: &[Template] = &[
    news("Central banks cut rates in concert; liquidity floods the market.", 1.10, 4, Aim::All),
    news("Geopolitical tension rattles investors across every sector.", 0.92, 3, Aim::All),
    news("Supply shock: {sector} runs short of a key material.", 0.85, 2, Aim::Sector(Some("Semiconductors"))),
    news("A state fund backs {sector}; the whole chain rallies.", 1.12, 5, Aim::Sector(Some("Technology"))),
    news("Credit easing revives trading in {sector}.", 1.15, 3, Aim::Sector(Some("Real Estate"))),
    news("An efficiency breakthrough lifts {sector}.", 1.20, 4, Aim::Sector(Some("Energy"))),
    news("Defense budgets jump; {sector} suppliers land large contracts.", 1.18, 3, Aim::Sector(Some("Defense"))),
    news("{sector} clears its inventory glut; earnings upgrades follow.", 1.08, 4, Aim::Sector(None)),
    news("Foreign pension funds pile into {sector}.", 1.15, 2, Aim::Sector(None)),
    news("Holiday spending beats forecasts for {sector}.", 1.08, 2, Aim::Sector(Some("Consumer"))),
    news("A bumper harvest eases costs across {sector}.", 1.06, 3, Aim::Sector(Some("Agriculture"))),
    news("Procurement reform squeezes smaller {sector} players.", 0.80, 4, Aim::Sector(Some("Healthcare"))),
    news("A key shipping lane closes; {sector} capacity tightens.", 1.10, 2, Aim::Sector(Some("Transport"))),
    news("{name} signs a strategic alliance with a global giant.", 1.15, 3, Aim::Index),
    news("{name} is sued over a core patent.", 0.75, 5, Aim::Index),
    news("Regulators question {name}'s accounts.", 0.65, 2, Aim::Index),
    news("{name} reshuffles its executive team.", 0.85, 3, Aim::Index),
    Template {
        message: "{name} suspends trading pending a merger review.",
        impact: None,
        duration: 2,
        aim: Aim::TempBanIndex,
        limit_change: None,
    },
    Template {
        message: "{sector} is halted for a compliance sweep.",
        impact: None,
        duration: 2,
        aim: Aim::TempBanSector,
        limit_change: None,
    },
    Template {
        message: "{sector} is overheated; buying curbs kick in.",
        impact: None,
        duration: 4,
        aim: Aim::BuyLimitSector,
        limit_change: Some(-4),
    },
];

/// The default news deck: one template drawn uniformly per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDeck;

impl EventSource for EventDeck {
    fn draw(&self, stocks: &[Stock], round: u32, rng: &mut StdRng) -> Option<MarketEvent> {
        if stocks.is_empty() {
            return None;
        }
        let template = *TEMPLATES.choose(rng)?;
        let random_index = |rng: &mut StdRng| rng.random_range(0..stocks.len());
        let random_sector = |rng: &mut StdRng| {
            let mut sectors: Vec<&str> = Vec::new();
            for s in stocks {
                if !sectors.contains(&s.sector.as_str()) {
                    sectors.push(&s.sector);
                }
            }
            sectors.choose(rng).map(|s| s.to_string()).unwrap_or_default()
        };

        let (target, message) = match template.aim {
            Aim::All => (EventTarget::All, template.message.to_string()),
            Aim::Sector(fixed) => {
                let sector = fixed.map_or_else(|| random_sector(rng), str::to_string);
                let message = template.message.replace("{sector}", &sector);
                (EventTarget::Sector(sector), message)
            }
            Aim::Index => {
                let idx = random_index(rng);
                let message = template.message.replace("{name}", &stocks[idx].name);
                (EventTarget::Index(idx), message)
            }
            Aim::TempBanIndex => {
                let idx = random_index(rng);
                let message = template.message.replace("{name}", &stocks[idx].name);
                (EventTarget::TempBan(Scope::Index(idx)), message)
            }
            Aim::TempBanSector => {
                let sector = random_sector(rng);
                let message = template.message.replace("{sector}", &sector);
                (EventTarget::TempBan(Scope::Sector(sector)), message)
            }
            Aim::BuyLimitSector => {
                let sector = random_sector(rng);
                let message = template.message.replace("{sector}", &sector);
                (EventTarget::BuyLimit(Scope::Sector(sector)), message)
            }
        };

        Some(MarketEvent {
            id: format!("evt-{round}-{:06x}", rng.random_range(0..0x100_0000u32)),
            message,
            impact: template.impact,
            duration: template.duration,
            target,
            limit_change: template.limit_change,
            kind: EventKind::News,
        })
    }
}
