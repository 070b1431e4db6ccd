//! Continuous state to discrete presentation state.
//!
//! The presentation layer never interprets pH values or temperatures itself.
//! [`map`] reduces a model and its current state to a [`VisualState`]: a
//! color token, an interpolated tint, a few boolean flags and ratios in
//! `[0, 1]`. The function is pure; calling it twice on the same input gives
//! the same output.
//!
//! # Mappings
//!
//! - **Thresholds**: phenolphthalein turns magenta above pH 8.2 (and at the
//!   endpoint of the titration), litmus is red below 4.5 and blue above 8.3,
//!   proteins denature above 55 C or outside pH 3..11, water freezes at
//!   0 C and boils at 100 C.
//! - **Blending**: clamped-linear interpolation between two reference colors
//!   (indicator intensity, thermometer tint, lamp glow).
//! - **Discrete outcomes**: precipitates, matter phase, projectile hit or
//!   miss, spectral band of a wavelength, the response of an object to a
//!   tool, the color of a food test.

use serde::Serialize;

use crate::models::{Cation, Indicator, Item, Model, Reagent, Response};
use crate::SimulationState;

/// pH above which phenolphthalein is colored.
pub const PHENOLPHTHALEIN_THRESHOLD: f64 = 8.2;

/// Litmus is red below this pH.
pub const LITMUS_ACID: f64 = 4.5;

/// Litmus is blue above this pH.
pub const LITMUS_BASE: f64 = 8.3;

/// Faintest visible pink once phenolphthalein has turned.
const MIN_INDICATOR_INTENSITY: f64 = 0.1;

/// Named colors the presentation layer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorToken {
    Colorless,
    White,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    Purple,
    Magenta,
    Gray,
}

impl ColorToken {
    pub fn name(&self) -> &'static str {
        match self {
            ColorToken::Colorless => "colorless",
            ColorToken::White => "white",
            ColorToken::Red => "red",
            ColorToken::Orange => "orange",
            ColorToken::Yellow => "yellow",
            ColorToken::Green => "green",
            ColorToken::Blue => "blue",
            ColorToken::Violet => "violet",
            ColorToken::Purple => "purple",
            ColorToken::Magenta => "magenta",
            ColorToken::Gray => "gray",
        }
    }
}

/// State of matter of water at a temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Matter {
    Solid,
    Liquid,
    Gas,
}

impl Matter {
    /// Solid at or below 0 C, gas from 100 C.
    pub fn of_water(temperature: f64) -> Self {
        Matter::between(temperature, 0.0, 100.0)
    }

    /// Solid at or below `melting`, gas from `boiling` up.
    pub fn between(temperature: f64, melting: f64, boiling: f64) -> Self {
        if temperature <= melting {
            Matter::Solid
        } else if temperature < boiling {
            Matter::Liquid
        } else {
            Matter::Gas
        }
    }
}

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Clamped linear blend, `t = 0` gives `self` and `t = 1` gives `other`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = ratio(t);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb { r: mix(self.r, other.r), g: mix(self.g, other.g), b: mix(self.b, other.b) }
    }

    /// `#rrggbb` notation.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

mod palette {
    use super::Rgb;

    pub const CLEAR: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const WATER: Rgb = Rgb::new(0xb3, 0xd9, 0xff);
    pub const LITMUS_NEUTRAL: Rgb = Rgb::new(0xe8, 0xd5, 0xf2);
    pub const LITMUS_ACID: Rgb = Rgb::new(0xff, 0x6b, 0x6b);
    pub const LITMUS_BASE: Rgb = Rgb::new(0x4d, 0xab, 0xf7);
    pub const MAGENTA: Rgb = Rgb::new(0xff, 0x6b, 0x9d);
    pub const COLD: Rgb = Rgb::new(0x4d, 0xab, 0xf7);
    pub const HOT: Rgb = Rgb::new(0xff, 0x6b, 0x6b);
    pub const LAMP_OFF: Rgb = Rgb::new(0x4b, 0x55, 0x63);
    pub const LAMP_ON: Rgb = Rgb::new(0xff, 0xd4, 0x3b);
    pub const COPPER_HYDROXIDE: Rgb = Rgb::new(0x33, 0x9a, 0xf0);
    pub const COPPER_SOLUTION: Rgb = Rgb::new(0xa5, 0xd8, 0xff);
    pub const ZINC_HYDROXIDE: Rgb = Rgb::new(0xf1, 0xf3, 0xf5);
    pub const DENATURED: Rgb = Rgb::new(0xf8, 0xf9, 0xfa);
    pub const ENZYME_IDLE: Rgb = Rgb::new(0xad, 0xb5, 0xbd);
    pub const ENZYME_ACTIVE: Rgb = Rgb::new(0x51, 0xcf, 0x66);
    pub const ICE: Rgb = Rgb::new(0xdb, 0xea, 0xfe);
    pub const STEAM: Rgb = Rgb::new(0xf1, 0xf5, 0xf9);
    pub const IRON: Rgb = Rgb::new(0x64, 0x74, 0x8b);
    pub const RUBBER: Rgb = Rgb::new(0xef, 0x44, 0x44);
    pub const SUGAR: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const WOOD: Rgb = Rgb::new(0xd9, 0x77, 0x06);
    pub const EXTRACT: Rgb = Rgb::new(0xfe, 0xf9, 0xc3);
    pub const STARCH_IODINE: Rgb = Rgb::new(0x31, 0x2e, 0x81);
    pub const BIURET_PROTEIN: Rgb = Rgb::new(0x93, 0x33, 0xea);
    pub const FAT_SPOT: Rgb = Rgb::new(0xea, 0xb3, 0x08);
}

/// Discrete outcomes of the current state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VisualFlags {
    /// A solid has formed in the test tube
    pub precipitate: bool,
    /// A solid has gone into solution (zinc hydroxide in excess, sugar in
    /// water, salt while stirring)
    pub dissolved: bool,
    /// The protein has unfolded
    pub denatured: bool,
    /// Ice and water are present together
    pub coexisting: bool,
    /// The phenomenon has run its course
    pub finished: bool,
    /// Hit or miss, once the projectile has landed
    pub hit: Option<bool>,
    /// Steam rises above the beaker
    pub vapor: bool,
    /// The burner under the beaker is lit
    pub heated: bool,
    /// A test left the object permanently out of shape
    pub deformed: bool,
}

/// What the presentation layer draws for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualState {
    pub color: ColorToken,
    pub tint: Rgb,
    /// Strength of the color or glow, in `[0, 1]`
    pub intensity: f64,
    /// How far the phenomenon has progressed, in `[0, 1]`
    pub progress: f64,
    pub matter: Option<Matter>,
    pub flags: VisualFlags,
}

impl VisualState {
    fn plain(color: ColorToken, tint: Rgb) -> Self {
        VisualState {
            color,
            tint,
            intensity: 0.0,
            progress: 0.0,
            matter: None,
            flags: VisualFlags::default(),
        }
    }
}

/// Clamps to `[0, 1]`, mapping NaN to 0.
pub fn ratio(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Litmus color at a pH.
pub fn litmus(ph: f64) -> (ColorToken, Rgb) {
    if ph < LITMUS_ACID {
        (ColorToken::Red, palette::LITMUS_ACID)
    } else if ph > LITMUS_BASE {
        (ColorToken::Blue, palette::LITMUS_BASE)
    } else {
        (ColorToken::Purple, palette::LITMUS_NEUTRAL)
    }
}

/// Phenolphthalein color and intensity at a pH.
///
/// `endpoint` marks a solution whose acid has been fully neutralized; the
/// indicator is then magenta even if the pH is not yet above the threshold.
pub fn phenolphthalein(ph: f64, endpoint: bool) -> (ColorToken, f64) {
    if ph > PHENOLPHTHALEIN_THRESHOLD || endpoint {
        let intensity = ratio((ph - 8.0) / 4.0).max(MIN_INDICATOR_INTENSITY);
        (ColorToken::Magenta, intensity)
    } else {
        (ColorToken::Colorless, 0.0)
    }
}

/// Spectral band of a wavelength in nanometres.
pub fn spectral_color(wavelength: f64) -> ColorToken {
    match wavelength {
        w if w >= 620.0 => ColorToken::Red,
        w if w >= 590.0 => ColorToken::Orange,
        w if w >= 570.0 => ColorToken::Yellow,
        w if w >= 495.0 => ColorToken::Green,
        w if w >= 450.0 => ColorToken::Blue,
        _ => ColorToken::Violet,
    }
}

fn spectral_tint(token: ColorToken) -> Rgb {
    match token {
        ColorToken::Red => Rgb::new(0xff, 0x00, 0x00),
        ColorToken::Orange => Rgb::new(0xff, 0x80, 0x00),
        ColorToken::Yellow => Rgb::new(0xff, 0xff, 0x00),
        ColorToken::Green => Rgb::new(0x00, 0xff, 0x00),
        ColorToken::Blue => Rgb::new(0x00, 0x00, 0xff),
        _ => Rgb::new(0x8b, 0x00, 0xff),
    }
}

/// Lamp glow for a current in amperes.
pub fn lamp_glow(current: f64) -> f64 {
    ratio(0.5 * current)
}

fn item_tint(item: Item) -> (ColorToken, Rgb) {
    match item {
        Item::IronNail => (ColorToken::Gray, palette::IRON),
        Item::RubberBall => (ColorToken::Red, palette::RUBBER),
        Item::SugarCube => (ColorToken::White, palette::SUGAR),
        Item::WoodBlock => (ColorToken::Orange, palette::WOOD),
    }
}

/// Color a food extract turns once a reagent has found its nutrient.
fn reaction_tint(reagent: Reagent) -> (ColorToken, Rgb) {
    match reagent {
        Reagent::Iodine => (ColorToken::Blue, palette::STARCH_IODINE),
        Reagent::Biuret => (ColorToken::Violet, palette::BIURET_PROTEIN),
        Reagent::Paper => (ColorToken::Yellow, palette::FAT_SPOT),
    }
}

fn value(state: &SimulationState, name: &str) -> f64 {
    state.get(name).unwrap_or(0.0)
}

/// Derives the visual state of `state` under `model`.
pub fn map(model: &Model, state: &SimulationState) -> VisualState {
    let finished = model.is_finished(state);
    let mut visual = match model {
        Model::ViscousFall(m) => {
            let mut v = VisualState::plain(ColorToken::Colorless, palette::CLEAR);
            v.progress = ratio(value(state, "depth") / m.cylinder_height);
            v.intensity = ratio(value(state, "velocity") / m.terminal_velocity());
            v
        }
        Model::Projectile(m) => {
            let mut v = VisualState::plain(ColorToken::Colorless, palette::CLEAR);
            v.progress = if m.range() > 0.0 {
                ratio(value(state, "x") / m.range())
            } else {
                ratio(state.time() / m.flight_time())
            };
            if finished {
                v.flags.hit = Some(m.is_hit());
            }
            v
        }
        Model::Incline(m) => {
            let mut v = VisualState::plain(ColorToken::Colorless, palette::CLEAR);
            v.progress = ratio(value(state, "distance") / m.length);
            v.intensity = ratio(value(state, "speed") / (m.acceleration() * m.travel_time()));
            v
        }
        Model::Titration(m) => {
            let volume = value(state, "volume_added");
            let ph = value(state, "ph");
            let mut v = match m.indicator {
                Indicator::None => VisualState::plain(ColorToken::Colorless, palette::WATER),
                Indicator::Litmus => {
                    let (color, tint) = litmus(ph);
                    let mut v = VisualState::plain(color, tint);
                    v.intensity = 1.0;
                    v
                }
                Indicator::Phenolphthalein => {
                    let (color, intensity) = phenolphthalein(ph, m.is_neutralized(volume));
                    let tint = palette::CLEAR.lerp(palette::MAGENTA, intensity);
                    let mut v = VisualState::plain(color, tint);
                    v.intensity = intensity;
                    v
                }
            };
            v.progress = ratio(volume / m.max_volume);
            v
        }
        Model::Calorimetry(m) => {
            let temperature = value(state, "temperature");
            let melted = value(state, "melted_ice");
            let mut v = VisualState::plain(
                ColorToken::Colorless,
                palette::COLD.lerp(palette::HOT, temperature / 100.0),
            );
            v.intensity = ratio(temperature / 100.0);
            let drop = m.water_temperature - m.equilibrium_temperature();
            v.progress =
                if drop > 0.0 { ratio((m.water_temperature - temperature) / drop) } else { 1.0 };
            v.matter = Some(Matter::of_water(temperature));
            v.flags.coexisting = m.ice_mass - melted > 1e-9;
            v
        }
        Model::Circuit(_) => {
            let glow = lamp_glow(value(state, "current"));
            let color = if glow > 0.0 { ColorToken::Yellow } else { ColorToken::Colorless };
            let mut v = VisualState::plain(color, palette::LAMP_OFF.lerp(palette::LAMP_ON, glow));
            v.intensity = glow;
            v.progress = 1.0;
            v
        }
        Model::Transformer(m) => {
            // Brightness relative to a lamp rated at twice the primary voltage
            let glow = ratio(value(state, "secondary_voltage") / (2.0 * m.primary_voltage));
            let color = if glow > 0.0 { ColorToken::Yellow } else { ColorToken::Colorless };
            let mut v = VisualState::plain(color, palette::LAMP_OFF.lerp(palette::LAMP_ON, glow));
            v.intensity = glow;
            v.progress = 1.0;
            v
        }
        Model::Denaturation(m) => {
            let temperature = value(state, "temperature");
            let ph = value(state, "ph");
            let efficiency = ratio(value(state, "efficiency") / 100.0);
            let denatured = m.is_denatured(temperature, ph);
            let mut v = if denatured {
                VisualState::plain(ColorToken::White, palette::DENATURED)
            } else {
                VisualState::plain(
                    ColorToken::Colorless,
                    palette::ENZYME_IDLE.lerp(palette::ENZYME_ACTIVE, efficiency),
                )
            };
            v.intensity = if denatured { 0.0 } else { efficiency };
            v.progress = 1.0;
            v.flags.denatured = denatured;
            v
        }
        Model::Buoyancy(m) => {
            let mut v = VisualState::plain(ColorToken::Colorless, palette::WATER);
            v.progress = ratio((value(state, "water_level") - m.initial_level) / m.initial_level);
            v.intensity = ratio(value(state, "water_level") / 100.0);
            v
        }
        Model::Diffraction(m) => {
            let color = spectral_color(m.wavelength);
            let mut v = VisualState::plain(color, spectral_tint(color));
            v.intensity = 1.0;
            v.progress = 1.0;
            v
        }
        Model::IonTest(m) => {
            let drops = value(state, "drops");
            let precipitate = m.has_precipitate(drops);
            let dissolved = m.is_dissolved(drops);
            let mut v = match (m.cation, precipitate) {
                (Cation::Copper, true) => {
                    VisualState::plain(ColorToken::Blue, palette::COPPER_HYDROXIDE)
                }
                (Cation::Copper, false) => {
                    VisualState::plain(ColorToken::Blue, palette::COPPER_SOLUTION)
                }
                (Cation::Zinc, true) => {
                    VisualState::plain(ColorToken::White, palette::ZINC_HYDROXIDE)
                }
                (Cation::Zinc, false) => VisualState::plain(ColorToken::Colorless, palette::CLEAR),
            };
            v.intensity = if precipitate { 1.0 } else { 0.0 };
            v.progress = ratio(drops / m.max_drops);
            v.flags.precipitate = precipitate;
            v.flags.dissolved = dissolved;
            v
        }
        Model::Ruler(_) => {
            let mut v = VisualState::plain(ColorToken::Colorless, palette::CLEAR);
            v.progress = 1.0;
            v
        }
        Model::PhaseChange(m) => {
            let temperature = value(state, "temperature");
            let matter = Matter::between(temperature, m.melting_point, m.boiling_point);
            // Thermometer color
            let (color, tint) = match matter {
                Matter::Solid => (ColorToken::Blue, palette::ICE),
                Matter::Liquid => (ColorToken::Orange, palette::WATER),
                Matter::Gas => (ColorToken::Red, palette::STEAM),
            };
            let mut v = VisualState::plain(color, tint);
            v.intensity =
                ratio((temperature - m.melting_point) / (m.boiling_point - m.melting_point));
            v.progress = ratio(value(state, "fill_level") / 100.0);
            v.matter = Some(matter);
            v.flags.vapor = matter == Matter::Gas;
            v.flags.heated = temperature > m.burner_threshold;
            v
        }
        Model::SolutionPreparation(m) => {
            let dissolved = value(state, "dissolved_salt");
            let mut v = VisualState::plain(ColorToken::Colorless, palette::WATER);
            v.intensity = ratio(m.total_mass() / m.target_mass);
            v.progress = if m.salt_mass > 0.0 { ratio(dissolved / m.salt_mass) } else { 1.0 };
            v.flags.dissolved = m.salt_mass > 0.0 && finished;
            v
        }
        Model::SubstanceTest(m) => {
            let (color, tint) = item_tint(m.item);
            let dissolved = value(state, "dissolved");
            let mut v = VisualState::plain(color, tint);
            v.intensity = ratio(1.0 - dissolved);
            v.progress = ratio(value(state, "progress"));
            v.flags.dissolved = m.response() == Response::Dissolved && finished;
            v.flags.deformed = value(state, "deformation") > 0.0;
            v
        }
        Model::FoodAnalysis(m) => {
            let reaction = ratio(value(state, "reaction"));
            let mut v = if m.is_positive() && reaction > 0.0 {
                let (color, tint) = reaction_tint(m.reagent);
                VisualState::plain(color, palette::EXTRACT.lerp(tint, reaction))
            } else {
                VisualState::plain(ColorToken::Yellow, palette::EXTRACT)
            };
            v.intensity = reaction;
            v.progress = ratio(value(state, "preparation"));
            v
        }
    };
    visual.flags.finished = finished;
    visual
}
