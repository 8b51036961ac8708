#![forbid(unsafe_code)]

//! End-to-end scenarios for memoized owners.
//!
//! 1. Unbounded cache: a non-deterministic body runs once.
//! 2. TTL: a read inside the TTL hits, a read after it recomputes.
//! 3. Dependency list: writing a listed property recomputes the member.
//! 4. Methods: equal args share an entry, different args do not.
//! 5. Failures: a failed computation is retried and then cached.
//! 6. Chained members on a shopping cart with several dependencies.
//! 7. Method TTL: each call signature expires on its own schedule.

use std::cell::Cell;

use memora_core::{
    ArgsKey, Clock, Getter, Intercept, LabClock, MemoError, MemoOptions, MemoOwner, MemoState,
    Method, Observable, SlotState,
};

// ── Fixtures ────────────────────────────────────────────────────────────

/// Deterministic stand-in for a random source.
struct Noise {
    state: Cell<u64>,
}

impl Noise {
    fn new(seed: u64) -> Self {
        Self {
            state: Cell::new(seed),
        }
    }

    fn next(&self) -> u64 {
        let next = self
            .state
            .get()
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state.set(next);
        next >> 16
    }
}

struct Sensor {
    x: Observable<i64>,
    noise: Noise,
    calls: Cell<u32>,
    memo: MemoState,
}

impl Sensor {
    fn new(clock: Clock) -> Self {
        Self {
            x: Observable::new(1),
            noise: Noise::new(7),
            calls: Cell::new(0),
            memo: MemoState::with_clock(clock),
        }
    }

    fn bump(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl MemoOwner for Sensor {
    fn memo(&self) -> &MemoState {
        &self.memo
    }

    fn tracked(&self, property: &str) -> Option<&dyn Intercept> {
        match property {
            "x" => Some(&self.x),
            _ => None,
        }
    }
}

const READING: Getter = Getter::new("reading");
const TIMED_READING: Getter =
    Getter::with_options("timed_reading", MemoOptions::new().with_ttl_ms(100));
const Y: Getter = Getter::with_options("y", MemoOptions::new().with_clear_on(&["x"]));
const ADD: Method = Method::new("add");
const FLAKY: Method = Method::new("flaky");
const QUOTE: Method = Method::with_options("quote", MemoOptions::new().with_ttl_ms(100));

impl Sensor {
    fn reading(&self) -> u64 {
        READING
            .get(self, |s| {
                s.bump();
                s.noise.next()
            })
            .unwrap()
    }

    fn timed_reading(&self) -> u64 {
        TIMED_READING.get(self, |s| s.noise.next()).unwrap()
    }

    fn y(&self) -> i64 {
        Y.get(self, |s| s.x.get() * 100 + s.noise.next() as i64 % 10)
            .unwrap()
    }

    fn add(&self, a: i64, b: i64) -> i64 {
        ADD.call(self, (a, b), |s, (a, b)| {
            s.bump();
            a + b
        })
        .unwrap()
    }

    fn quote(&self, symbol: u32) -> u64 {
        QUOTE
            .call(self, (symbol,), |s, _| {
                s.bump();
                s.noise.next()
            })
            .unwrap()
    }

    fn flaky(&self, n: u32) -> Result<u32, SensorError> {
        FLAKY.try_call(self, (n,), |s, (n,)| {
            s.bump();
            if s.calls.get() == 1 {
                Err(SensorError::Offline)
            } else {
                Ok(n * s.calls.get())
            }
        })
    }
}

#[derive(Debug, PartialEq)]
enum SensorError {
    Offline,
    Setup(String),
}

impl From<MemoError> for SensorError {
    fn from(err: MemoError) -> Self {
        Self::Setup(err.to_string())
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn scenario_1_unbounded_cache_runs_body_once() {
    let s = Sensor::new(Clock::Real);
    let first = s.reading();
    let second = s.reading();
    assert_eq!(first, second);
    assert_eq!(s.calls.get(), 1);
}

#[test]
fn scenario_2_ttl() {
    let lab = LabClock::new();
    let s = Sensor::new(Clock::lab(&lab));

    let t0 = s.timed_reading();
    lab.advance_ms(50);
    assert_eq!(s.timed_reading(), t0);

    lab.advance_ms(100);
    let t150 = s.timed_reading();
    assert_ne!(t150, t0);

    // The recomputation restarts the TTL window.
    lab.advance_ms(99);
    assert_eq!(s.timed_reading(), t150);
}

#[test]
fn method_signatures_expire_independently() {
    let lab = LabClock::new();
    let s = Sensor::new(Clock::lab(&lab));
    let key = |symbol: u32| ArgsKey::encode(&(symbol,)).unwrap();

    let q1 = s.quote(1);
    lab.advance_ms(60);
    let q2 = s.quote(2);
    assert_eq!(s.quote(1), q1);
    assert_eq!(s.calls.get(), 2);

    // t = 110: signature 1 is past its TTL, signature 2 is not.
    lab.advance_ms(50);
    assert_eq!(s.memo.slot_state("quote", Some(&key(1))), SlotState::Stale);
    assert_eq!(s.memo.slot_state("quote", Some(&key(2))), SlotState::Fresh);
    assert_eq!(s.memo.cached_entries(), 2);
    assert_eq!(s.quote(2), q2);
    assert_eq!(s.calls.get(), 2);

    let q1_again = s.quote(1);
    assert_ne!(q1_again, q1);
    assert_eq!(s.memo.slot_state("quote", Some(&key(1))), SlotState::Fresh);
    assert_eq!(s.calls.get(), 3);

    // t = 170: signature 2 expires, the recomputed signature 1 does not.
    lab.advance_ms(60);
    assert_eq!(s.memo.slot_state("quote", Some(&key(2))), SlotState::Stale);
    assert_eq!(s.quote(1), q1_again);
    assert_ne!(s.quote(2), q2);
    assert_eq!(s.calls.get(), 4);
}

#[test]
fn scenario_3_dependency_write_recomputes() {
    let s = Sensor::new(Clock::Real);
    let before = s.y();
    assert_eq!(s.y(), before);

    s.x.set(2);
    let after = s.y();
    assert_ne!(before, after);
    assert_eq!(after / 100, 2);
}

#[test]
fn scenario_4_methods_cache_per_signature() {
    let s = Sensor::new(Clock::Real);
    assert_eq!(s.add(1, 2), 3);
    assert_eq!(s.add(1, 2), 3);
    assert_eq!(s.calls.get(), 1);

    assert_eq!(s.add(2, 1), 3);
    assert_eq!(s.calls.get(), 2);
}

#[test]
fn scenario_5_failure_does_not_poison() {
    let s = Sensor::new(Clock::Real);
    assert_eq!(s.flaky(5), Err(SensorError::Offline));
    assert_eq!(s.memo.stats().stores, 0);

    let ok = s.flaky(5).unwrap();
    assert_eq!(ok, 10);
    assert_eq!(s.flaky(5), Ok(ok));
    assert_eq!(s.calls.get(), 2);
}

#[test]
fn instances_are_isolated() {
    let a = Sensor::new(Clock::Real);
    let b = Sensor {
        noise: Noise::new(99),
        ..Sensor::new(Clock::Real)
    };

    let ra = a.reading();
    let rb = b.reading();
    assert_ne!(ra, rb);
    assert_eq!(a.reading(), ra);
    assert_eq!(b.reading(), rb);

    let ya = a.y();
    let yb = b.y();
    a.x.set(50);
    assert_eq!(b.memo.slot_state("y", None), SlotState::Fresh);
    assert_eq!(b.y(), yb);
    assert_ne!(a.y(), ya);
}

// ── Shopping cart ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Item {
    price: f64,
    quantity: u32,
}

struct Cart {
    items: Observable<Vec<Item>>,
    discount_code: Observable<String>,
    tax_rate: Observable<f64>,
    runs: Cell<u32>,
    memo: MemoState,
}

impl MemoOwner for Cart {
    fn memo(&self) -> &MemoState {
        &self.memo
    }

    fn tracked(&self, property: &str) -> Option<&dyn Intercept> {
        match property {
            "items" => Some(&self.items),
            "discount_code" => Some(&self.discount_code),
            "tax_rate" => Some(&self.tax_rate),
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
    MemoOptions::new().with_clear_on(&["items", "discount_code", "tax_rate"]),
);

impl Cart {
    fn new() -> Self {
        Self {
            items: Observable::new(Vec::new()),
            // Codes are case-insensitive.
            discount_code: Observable::with_setter(String::new(), |slot, v: String| {
                *slot = v.to_uppercase();
            }),
            tax_rate: Observable::new(0.08),
            runs: Cell::new(0),
            memo: MemoState::new(),
        }
    }

    fn subtotal(&self) -> memora_core::Result<f64> {
        SUBTOTAL.get(self, |c| {
            c.runs.set(c.runs.get() + 1);
            c.items
                .with(|items| items.iter().map(|i| i.price * f64::from(i.quantity)).sum())
        })
    }

    fn discount(&self) -> memora_core::Result<f64> {
        DISCOUNT.try_get(self, |c| {
            let subtotal = c.subtotal()?;
            Ok(if c.discount_code.get() == "SAVE10" {
                subtotal * 0.1
            } else {
                0.0
            })
        })
    }

    fn total(&self) -> memora_core::Result<f64> {
        TOTAL.try_get(self, |c| {
            let after = c.subtotal()? - c.discount()?;
            Ok(after + after * c.tax_rate.get())
        })
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn cart_chains_memoized_members() {
    let cart = Cart::new();
    cart.items.set(vec![
        Item {
            price: 10.0,
            quantity: 2,
        },
        Item {
            price: 15.0,
            quantity: 1,
        },
    ]);

    assert!(close(cart.subtotal().unwrap(), 35.0));
    assert!(close(cart.total().unwrap(), 37.8));
    assert!(close(cart.total().unwrap(), 37.8));
    assert_eq!(cart.runs.get(), 1);

    cart.discount_code.set("save10".into());
    assert_eq!(cart.discount_code.get(), "SAVE10");
    assert_eq!(cart.memo.slot_state("subtotal", None), SlotState::Fresh);
    assert!(close(cart.total().unwrap(), 34.02));
    assert_eq!(cart.runs.get(), 1);

    cart.items.update(|items| {
        items.push(Item {
            price: 5.0,
            quantity: 3,
        })
    });
    assert!(close(cart.total().unwrap(), 48.6));
    assert_eq!(cart.runs.get(), 2);

    cart.tax_rate.set(0.0);
    assert!(close(cart.total().unwrap(), 45.0));
    assert_eq!(cart.memo.slot_state("discount", None), SlotState::Fresh);
}

#[test]
fn first_access_inside_a_borrow_of_its_dependency() {
    let cart = Cart::new();
    cart.items.set(vec![Item {
        price: 4.0,
        quantity: 2,
    }]);

    let (len, subtotal) = cart
        .items
        .with(|items| (items.len(), cart.subtotal().unwrap()));
    assert_eq!(len, 1);
    assert!(close(subtotal, 8.0));
    assert!(cart.memo.is_intercepted("items"));

    cart.items.update(|items| items[0].quantity = 3);
    assert!(close(cart.subtotal().unwrap(), 12.0));
    assert_eq!(cart.runs.get(), 2);
}

#[test]
fn shared_dependency_is_hooked_once() {
    let cart = Cart::new();
    cart.total().unwrap();
    assert_eq!(cart.items.subscriber_count(), 1);
    assert_eq!(cart.memo.dependents("items"), vec!["total", "subtotal", "discount"]);
    assert!(cart.memo.is_intercepted("tax_rate"));
}

#[test]
fn dropping_owner_releases_hooks() {
    let items = Observable::new(Vec::<Item>::new());
    {
        let cart = Cart {
            items: items.clone(),
            ..Cart::new()
        };
        cart.subtotal().unwrap();
        assert_eq!(items.subscriber_count(), 1);
    }
    assert_eq!(items.subscriber_count(), 0);
    items.set(Vec::new());
}
