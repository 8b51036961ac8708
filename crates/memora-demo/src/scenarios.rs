//! The walkthroughs. Each builds a small owner type, prints what it observes
//! to `out`, and returns the first error it hits.

use std::cell::Cell;
use std::io::Write;

use memora_core::{
    Clock, Getter, Intercept, LabClock, MemoOptions, MemoOwner, MemoState, Method, Observable,
};
use tracing::info;

use crate::cli::TtlArgs;
use crate::error::{DemoError, Result};

pub const DEFAULT_TTL_MS: u64 = 5_000;
pub const DEFAULT_WAIT_MS: u64 = 6_000;

// ── Basic ───────────────────────────────────────────────────────────────

struct DataProcessor {
    raw_data: Vec<i64>,
    computations: Cell<u32>,
    memo: MemoState,
}

impl MemoOwner for DataProcessor {
    fn memo(&self) -> &MemoState {
        &self.memo
    }
}

const SUM_OF_SQUARES: Getter = Getter::new("sum_of_squares");

impl DataProcessor {
    fn sum_of_squares(&self) -> memora_core::Result<i64> {
        SUM_OF_SQUARES.get(self, |p| {
            p.computations.set(p.computations.get() + 1);
            p.raw_data.iter().map(|n| n * n).sum()
        })
    }
}

pub fn basic(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== Basic ===")?;
    let processor = DataProcessor {
        raw_data: vec![1, 2, 3, 4, 5],
        computations: Cell::new(0),
        memo: MemoState::new(),
    };
    writeln!(out, "first call:  {}", processor.sum_of_squares()?)?;
    writeln!(out, "second call: {}", processor.sum_of_squares()?)?;
    writeln!(out, "computations: {}", processor.computations.get())?;
    Ok(())
}

// ── TTL ─────────────────────────────────────────────────────────────────

struct WeatherService {
    api_calls: Cell<u32>,
    /// The station fails this many requests before answering.
    outages: Cell<u32>,
    ttl_ms: u64,
    memo: MemoState,
}

impl MemoOwner for WeatherService {
    fn memo(&self) -> &MemoState {
        &self.memo
    }
}

impl WeatherService {
    fn current_temperature(&self) -> Result<i32> {
        let getter = Getter::with_options(
            "current_temperature",
            MemoOptions::new().with_ttl_ms(self.ttl_ms),
        );
        getter.try_get(self, |w| {
            let call = w.api_calls.get() + 1;
            w.api_calls.set(call);
            if w.outages.get() > 0 {
                w.outages.set(w.outages.get() - 1);
                return Err(DemoError::StationOffline { attempts: call });
            }
            info!(call, "weather api called");
            // Simulated reading between 10 and 39 degrees.
            Ok(10 + (call as i32 * 17) % 30)
        })
    }
}

pub fn ttl(out: &mut dyn Write, args: &TtlArgs) -> Result<()> {
    writeln!(out, "=== TTL ===")?;
    let lab = LabClock::new();
    let weather = WeatherService {
        api_calls: Cell::new(0),
        outages: Cell::new(1),
        ttl_ms: args.ttl_ms,
        memo: MemoState::with_clock(Clock::lab(&lab)),
    };

    match weather.current_temperature() {
        Err(err @ DemoError::StationOffline { .. }) => writeln!(out, "first request failed: {err}")?,
        other => writeln!(out, "unexpected first reading: {other:?}")?,
    }
    writeln!(out, "temperature: {}", weather.current_temperature()?)?;
    writeln!(out, "temperature (cached): {}", weather.current_temperature()?)?;

    lab.advance_ms(args.wait_ms);
    let expired = args.wait_ms >= args.ttl_ms;
    writeln!(
        out,
        "temperature after {}ms (ttl {}ms, {}): {}",
        args.wait_ms,
        args.ttl_ms,
        if expired { "expired" } else { "still cached" },
        weather.current_temperature()?
    )?;
    writeln!(out, "api calls: {}", weather.api_calls.get())?;
    Ok(())
}

// ── Clear on write ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Settings {
    theme: String,
}

struct UserProfile {
    user_id: Observable<String>,
    settings: Observable<Settings>,
    lookups: Cell<u32>,
    memo: MemoState,
}

impl MemoOwner for UserProfile {
    fn memo(&self) -> &MemoState {
        &self.memo
    }

    fn tracked(&self, property: &str) -> Option<&dyn Intercept> {
        match property {
            "user_id" => Some(&self.user_id),
            "settings" => Some(&self.settings),
            _ => None,
        }
    }
}

const DISPLAY_NAME: Getter = Getter::with_options(
    "display_name",
    MemoOptions::new().with_clear_on(&["user_id"]),
);
const PREFERENCES: Getter = Getter::with_options(
    "preferences",
    MemoOptions::new().with_clear_on(&["user_id", "settings"]),
);

impl UserProfile {
    fn display_name(&self) -> memora_core::Result<String> {
        DISPLAY_NAME.get(self, |p| {
            p.lookups.set(p.lookups.get() + 1);
            format!("Display name for {}", p.user_id.get())
        })
    }

    fn preferences(&self) -> memora_core::Result<String> {
        PREFERENCES.get(self, |p| {
            p.settings
                .with(|s| format!("{} prefers {} theme", p.user_id.get(), s.theme))
        })
    }
}

pub fn clear_on(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== Clear on write ===")?;
    let profile = UserProfile {
        user_id: Observable::new("user123".into()),
        settings: Observable::new(Settings {
            theme: "dark".into(),
        }),
        lookups: Cell::new(0),
        memo: MemoState::new(),
    };

    writeln!(out, "display name: {}", profile.display_name()?)?;
    writeln!(out, "display name (cached): {}", profile.display_name()?)?;
    writeln!(out, "preferences: {}", profile.preferences()?)?;

    profile.settings.set(Settings {
        theme: "light".into(),
    });
    writeln!(out, "preferences (settings changed): {}", profile.preferences()?)?;
    writeln!(out, "display name (unaffected): {}", profile.display_name()?)?;

    profile.user_id.set("user456".into());
    writeln!(out, "display name (user changed): {}", profile.display_name()?)?;
    writeln!(out, "preferences (user changed): {}", profile.preferences()?)?;
    writeln!(out, "database lookups: {}", profile.lookups.get())?;
    Ok(())
}

// ── Shopping cart ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: &'static str,
    price_cents: u64,
    quantity: u64,
}

struct ShoppingCart {
    items: Observable<Vec<Item>>,
    discount_code: Observable<String>,
    tax_rate_bp: Observable<u64>,
    quotes: Cell<u32>,
    memo: MemoState,
}

impl MemoOwner for ShoppingCart {
    fn memo(&self) -> &MemoState {
        &self.memo
    }

    fn tracked(&self, property: &str) -> Option<&dyn Intercept> {
        match property {
            "items" => Some(&self.items),
            "discount_code" => Some(&self.discount_code),
            "tax_rate_bp" => Some(&self.tax_rate_bp),
            _ => None,
        }
    }
}

const SUBTOTAL: Getter =
    Getter::with_options("subtotal", MemoOptions::new().with_clear_on(&["items"]));
const DISCOUNT: Getter = Getter::with_options(
    "discount",
    MemoOptions::new().with_clear_on(&["items", "discount_code"]),
);
const TOTAL: Getter = Getter::with_options(
    "total",
    MemoOptions::new().with_clear_on(&["items", "discount_code", "tax_rate_bp"]),
);
const SHIPPING: Method =
    Method::with_options("shipping", MemoOptions::new().with_clear_on(&["items"]));

impl ShoppingCart {
    fn new() -> Self {
        Self {
            items: Observable::new(Vec::new()),
            discount_code: Observable::with_setter(String::new(), |slot, code: String| {
                *slot = code.trim().to_uppercase();
            }),
            tax_rate_bp: Observable::new(800),
            quotes: Cell::new(0),
            memo: MemoState::new(),
        }
    }

    fn subtotal(&self) -> memora_core::Result<u64> {
        SUBTOTAL.get(self, |c| {
            c.items
                .with(|items| items.iter().map(|i| i.price_cents * i.quantity).sum())
        })
    }

    fn discount(&self) -> memora_core::Result<u64> {
        DISCOUNT.try_get(self, |c| {
            let subtotal = c.subtotal()?;
            Ok(if c.discount_code.get() == "SAVE10" {
                subtotal / 10
            } else {
                0
            })
        })
    }

    fn total(&self) -> memora_core::Result<u64> {
        TOTAL.try_get(self, |c| {
            let after = c.subtotal()? - c.discount()?;
            Ok(after + after * c.tax_rate_bp.get() / 10_000)
        })
    }

    fn shipping(&self, zone: &str, express: bool) -> memora_core::Result<u64> {
        SHIPPING.call(self, (zone, express), |c, (zone, express)| {
            c.quotes.set(c.quotes.get() + 1);
            let units: u64 = c.items.with(|items| items.iter().map(|i| i.quantity).sum());
            let base = if zone == "domestic" { 500 } else { 1_500 };
            let per_unit = if express { 250 } else { 100 };
            base + units * per_unit
        })
    }
}

fn dollars(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

pub fn cart(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "=== Shopping cart ===")?;
    let cart = ShoppingCart::new();
    cart.items.set(vec![
        Item {
            id: "1",
            price_cents: 1_000,
            quantity: 2,
        },
        Item {
            id: "2",
            price_cents: 1_500,
            quantity: 1,
        },
    ]);

    writeln!(out, "subtotal: {}", dollars(cart.subtotal()?))?;
    writeln!(out, "total: {}", dollars(cart.total()?))?;
    writeln!(out, "total (cached): {}", dollars(cart.total()?))?;

    cart.discount_code.set(" save10 ".into());
    writeln!(out, "total (after discount): {}", dollars(cart.total()?))?;

    writeln!(out, "shipping domestic: {}", dollars(cart.shipping("domestic", false)?))?;
    writeln!(out, "shipping domestic express: {}", dollars(cart.shipping("domestic", true)?))?;
    writeln!(out, "shipping domestic (cached): {}", dollars(cart.shipping("domestic", false)?))?;

    cart.items.update(|items| {
        items.push(Item {
            id: "3",
            price_cents: 500,
            quantity: 3,
        })
    });
    let ids: Vec<&str> = cart.items.with(|items| items.iter().map(|i| i.id).collect());
    writeln!(out, "items: {}", ids.join(", "))?;
    writeln!(out, "total (after adding item): {}", dollars(cart.total()?))?;
    writeln!(out, "shipping domestic: {}", dollars(cart.shipping("domestic", false)?))?;
    writeln!(out, "shipping quotes computed: {}", cart.quotes.get())?;

    let stats = cart.memo.stats();
    writeln!(
        out,
        "cache: {} hits, {} misses, {} invalidations",
        stats.hits, stats.misses, stats.invalidations
    )?;
    Ok(())
}
