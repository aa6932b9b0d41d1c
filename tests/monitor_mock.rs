use battmon::clock::{Clock, ManualClock, SystemClock};
use battmon::config::BattmonConfig;
use battmon::info::{BatteryInfo, FaultState, MonitorMode};
use battmon::monitor::recovery::RecoveryOutcome;
use battmon::monitor::{Battery, Hardware, scheduler};
use battmon::property::{
    CableType, CapacityKind, ChargeStatus, ChargeType, Health, Property, VoltageKind,
};
use battmon::supply::mock::{MockJig, MockSupply};
use std::sync::Arc;
use std::time::Duration;

const VCELL: Property = Property::VoltageNow(VoltageKind::Vcell);
const VFOCV: Property = Property::VoltageNow(VoltageKind::Vfocv);
const SOC: Property = Property::Capacity(CapacityKind::Adjusted);
const RAW_SOC: Property = Property::Capacity(CapacityKind::Raw);

struct Bench {
    battery: Battery,
    charger: MockSupply,
    fuel_gauge: MockSupply,
    clock: Arc<ManualClock>,
}

impl Bench {
    /// Mains attached, charger reporting CHARGING, healthy battery at 25 °C.
    fn new(config: BattmonConfig) -> Self {
        let charger = MockSupply::new("charger");
        let fuel_gauge = MockSupply::new("fuelgauge");
        charger.set_value(Property::Online, CableType::Mains.as_raw());
        charger.set_value(Property::Status, ChargeStatus::Charging.as_raw());
        charger.set_value(Property::Health, Health::Good.as_raw());
        charger.set_value(Property::Present, 1);
        fuel_gauge.set_value(Property::Temp, 250);

        let clock = Arc::new(ManualClock::default());
        let bench = Self {
            battery: Battery::probe(
                config,
                Hardware::mock(&charger, &fuel_gauge, &MockJig::default(), clock.clone()),
            )
            .unwrap(),
            charger,
            fuel_gauge,
            clock,
        };
        bench.cell(3_500_000, 20);
        bench
    }

    fn cell(&self, vcell: i32, soc: i32) {
        self.fuel_gauge.set_value(VCELL, vcell);
        self.fuel_gauge.set_value(VFOCV, vcell);
        self.fuel_gauge.set_value(SOC, soc);
        self.fuel_gauge.set_value(RAW_SOC, soc * 100);
    }

    fn status(&self, status: ChargeStatus) {
        self.charger.set_value(Property::Status, status.as_raw());
    }

    /// Advance virtual time by the scheduled interval and run a cycle.
    fn cycle(&self) -> BatteryInfo {
        let outcome = self.battery.monitor_cycle();
        self.clock.advance(outcome.next.interval);
        self.battery.info()
    }
}

#[test]
fn scenario_full_charge_enters_recharge_phase() {
    let bench = Bench::new(BattmonConfig::default());
    let max = bench.battery.config().battery.voltage_max;

    let ramp = [
        (3_500_000, 20, ChargeStatus::Charging),
        (3_800_000, 50, ChargeStatus::Charging),
        (4_100_000, 80, ChargeStatus::Charging),
        (4_250_000, 94, ChargeStatus::Charging),
        (max - 40_000, 97, ChargeStatus::Full),
    ];

    let mut full = Vec::new();
    for (step, (vcell, soc, status)) in ramp.into_iter().enumerate() {
        bench.cell(vcell, soc);
        bench.status(status);
        if step == ramp.len() - 1 {
            bench.charger.take_writes();
        }
        let info = bench.cycle();
        full.push((info.full_charged_state, info.recharge_phase));
    }

    assert_eq!(
        full,
        vec![
            (false, false),
            (false, false),
            (false, false),
            (false, false),
            (true, true)
        ]
    );

    // (OFF, KEEP): charge current off and charger disabled, input untouched.
    assert_eq!(
        bench.charger.writes_to(Property::ChargeType),
        vec![ChargeType::None.as_raw()]
    );
    assert_eq!(bench.charger.writes_to(Property::CurrentNow), vec![0]);
    assert!(bench.charger.writes_to(Property::CurrentMax).is_empty());
    assert_eq!(
        bench.fuel_gauge.writes_to(Property::Status),
        vec![ChargeStatus::Full.as_raw()]
    );

    let info = bench.battery.info();
    assert!(!info.is_charging_enabled());
    assert_eq!(info.input_current, 1000);
    let shown = bench.battery.indicator();
    assert_eq!(shown.status, ChargeStatus::Full);
    assert_eq!(shown.soc, 100);
}

#[test]
fn recharge_restarts_charger_below_threshold() {
    let bench = Bench::new(BattmonConfig::default());
    let battery_cfg = bench.battery.config().battery.clone();
    bench.cell(battery_cfg.voltage_max - 40_000, 97);
    bench.status(ChargeStatus::Full);
    bench.cycle();
    bench.cycle();
    assert!(bench.battery.info().full_charged_state);

    bench.status(ChargeStatus::NotCharging);
    bench.cell(battery_cfg.recharge_voltage() + 10_000, 96);
    let info = bench.cycle();
    assert!(!info.is_charging_enabled());
    assert!(info.full_charged_state);

    bench.charger.take_writes();
    bench.cell(battery_cfg.recharge_voltage() - 10_000, 94);
    let info = bench.cycle();
    assert!(info.recharge_phase);
    assert!(!info.full_charged_state);
    assert_eq!(
        bench.charger.writes_to(Property::ChargeType),
        vec![ChargeType::Fast.as_raw()]
    );
    assert_eq!(bench.battery.indicator().status, ChargeStatus::Charging);
}

#[test]
fn scenario_overheat_hysteresis() {
    let mut config = BattmonConfig::default();
    config.battery.overheat_stop_temp = 450;
    config.battery.overheat_recovery_temp = 420;
    let bench = Bench::new(config);
    bench.cell(3_900_000, 60);

    let timeline: Vec<bool> = [250, 350, 450, 460, 440, 430, 420]
        .into_iter()
        .map(|temper| {
            bench.fuel_gauge.set_value(Property::Temp, temper);
            bench.cycle().overheated_state
        })
        .collect();

    assert_eq!(timeline, vec![false, false, true, true, true, true, false]);
    let info = bench.battery.info();
    assert!(!info.freezed_state);
    assert!(info.is_charging_enabled());
}

#[test]
fn scenario_recovery_resets_soc_once() {
    let bench = Bench::new(BattmonConfig::default());
    bench.cell(4_000_000, 70);
    bench.cycle();

    bench.charger.set_value(Property::Present, 0);
    let outcome = bench.battery.monitor_cycle();
    assert!(outcome.recovery);

    bench.charger.script(Property::Present, [0, 0, 0, 1]);
    bench.fuel_gauge.set_value(VCELL, 3_850_000);
    let recovered = bench.battery.recover();
    assert_eq!(
        recovered,
        RecoveryOutcome::Recovered {
            attempts: 4,
            soc_reset: true
        }
    );

    bench.cycle();
    assert_eq!(bench.battery.recover(), RecoveryOutcome::NotNeeded);
    assert_eq!(bench.fuel_gauge.writes_to(SOC), vec![1]);
    assert!(!bench.battery.info().vf_state);
}

#[test]
fn presence_fault_outranks_health() {
    let bench = Bench::new(BattmonConfig::default());
    bench.cell(3_900_000, 60);
    bench.cycle();

    bench.charger.set_value(Property::Present, 0);
    bench.charger.set_value(Property::Health, Health::Dead.as_raw());
    let info = bench.cycle();

    assert!(info.vf_state);
    assert!(!info.health_state);
    assert_eq!(info.fault(), FaultState::Vf);
    assert!(!info.is_charging_enabled());
    assert_eq!(bench.battery.indicator().status, ChargeStatus::NotCharging);
}

#[test]
fn temperature_fault_suppresses_health_check() {
    let mut config = BattmonConfig::default();
    config.recovery.enabled = false;
    let bench = Bench::new(config);
    bench.cell(3_900_000, 60);
    bench.cycle();

    bench.fuel_gauge.set_value(Property::Temp, 650);
    assert!(bench.cycle().overheated_state);

    bench.charger
        .set_value(Property::Health, Health::Undervoltage.as_raw());
    let info = bench.cycle();
    assert!(info.overheated_state);
    assert!(!info.health_state);
    assert_eq!(info.fault(), FaultState::Overheated);
}

#[test]
fn steady_state_cycles_are_stable() {
    let bench = Bench::new(BattmonConfig::default());
    bench.cell(3_900_000, 60);

    bench.cycle();
    bench.cycle();
    let third = bench.cycle();
    bench.charger.take_writes();
    bench.fuel_gauge.take_writes();
    let fourth = bench.cycle();

    assert_eq!(third, fourth);
    assert!(bench.charger.writes().is_empty());
    assert!(bench.fuel_gauge.writes().is_empty());
    assert_eq!(fourth.monitor_mode, MonitorMode::Chng);
}

#[test]
fn boot_cycles_poll_at_emergency_rate() {
    let bench = Bench::new(BattmonConfig::default());
    bench.cell(3_900_000, 60);

    let modes: Vec<MonitorMode> = (0..3).map(|_| bench.cycle().monitor_mode).collect();
    assert_eq!(
        modes,
        vec![MonitorMode::EmerLv1, MonitorMode::EmerLv1, MonitorMode::Chng]
    );
}

#[test]
fn abstimer_stops_long_charge() {
    let bench = Bench::new(BattmonConfig::default());
    bench.cell(3_900_000, 60);
    bench.cycle();
    assert!(bench.battery.info().is_charging_enabled());

    let limit = bench.battery.config().battery.abstimer_charge_duration;
    bench.clock.advance(Duration::from_secs(limit + 1));
    let info = bench.cycle();

    assert!(info.recharge_phase);
    assert!(!info.is_charging_enabled());
    assert_eq!(bench.battery.indicator().status, ChargeStatus::Charging);
}

#[test]
fn lagging_charger_polls_fast_until_settled() {
    let bench = Bench::new(BattmonConfig::default());
    bench.cell(3_900_000, 60);
    bench.status(ChargeStatus::Discharging);
    // Enable read-back still says DISCHARGING, then the charger catches up.
    bench.charger.script(
        Property::Status,
        [
            ChargeStatus::Discharging.as_raw(),
            ChargeStatus::Discharging.as_raw(),
            ChargeStatus::Charging.as_raw(),
        ],
    );

    let info = bench.cycle();
    assert!(info.ambiguous_state);
    assert_eq!(info.monitor_mode, MonitorMode::EmerLv2);
    assert_eq!(info.charge_virt_state, ChargeStatus::Charging);

    let info = bench.cycle();
    assert!(!info.ambiguous_state);
    assert_eq!(info.charge_real_state, ChargeStatus::Charging);
}

fn wait_until(check: impl Fn() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn scheduler_runs_cycles_and_recovery() {
    let charger = MockSupply::new("charger");
    let fuel_gauge = MockSupply::new("fuelgauge");
    charger.set_value(Property::Online, CableType::Usb.as_raw());
    charger.set_value(Property::Status, ChargeStatus::Charging.as_raw());
    charger.set_value(Property::Present, 1);
    fuel_gauge.set_value(VCELL, 3_900_000);
    fuel_gauge.set_value(RAW_SOC, 6_000);

    let mut config = BattmonConfig::default();
    config.recovery.delay_ms = 10;
    config.recovery.attempts = 50;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let battery = Arc::new(
        Battery::probe(
            config,
            Hardware::mock(&charger, &fuel_gauge, &MockJig::default(), clock),
        )
        .unwrap(),
    );

    let (handle, thread) = scheduler::spawn(Arc::clone(&battery));
    assert!(wait_until(|| battery.info().monitor_count >= 1));
    assert!(battery.info().is_charging_enabled());

    handle.suspend();
    assert!(wait_until(|| battery.is_suspended()));
    handle.resume();
    assert!(wait_until(|| !battery.is_suspended()));

    charger.set_value(Property::Present, 0);
    handle.trigger();
    assert!(wait_until(|| battery.info().vf_state));
    charger.set_value(Property::Present, 1);
    assert!(wait_until(|| !battery.info().vf_state));

    handle.shutdown();
    thread.join().unwrap();
}

fn bundled_scenario(file: &str) -> Vec<battmon::simulate::TimelineEntry> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(file);
    let scenario = battmon::simulate::Scenario::load(&path).unwrap();
    battmon::simulate::run(&scenario).unwrap()
}

#[test]
fn bundled_full_charge_scenario() {
    let timeline = bundled_scenario("full_charge.toml");
    assert_eq!(timeline.len(), 5);
    assert!(timeline[..3].iter().all(|e| e.shown == ChargeStatus::Charging));
    assert_eq!(timeline[3].shown, ChargeStatus::Full);
    assert!(!timeline[3].charging);
    assert_eq!(timeline[4].shown, ChargeStatus::Charging);
    assert!(timeline[4].charging);
}

#[test]
fn bundled_battery_pulled_scenario() {
    let timeline = bundled_scenario("battery_pulled.toml");
    assert_eq!(timeline[1].fault, FaultState::Vf);
    assert_eq!(timeline[1].shown, ChargeStatus::NotCharging);
    assert!(timeline[1].recovery.is_some());
    assert_eq!(timeline[3].fault, FaultState::Normal);
    assert!(timeline[3].charging);
}

#[test]
fn cable_attached_while_suspended_charges_after_resume() {
    let bench = Bench::new(BattmonConfig::default());
    bench
        .charger
        .set_value(Property::Online, CableType::None.as_raw());
    bench.status(ChargeStatus::Discharging);
    for _ in 0..3 {
        bench.cycle();
    }

    bench.battery.suspend();
    bench
        .charger
        .set_value(Property::Online, CableType::Mains.as_raw());
    let info = bench.cycle();
    assert!(!info.is_charging_enabled());
    assert!(bench.charger.writes().is_empty());

    bench.battery.resume();
    let info = bench.cycle();
    assert!(info.is_charging_enabled());
    assert_eq!(
        bench.charger.writes_to(Property::ChargeType),
        vec![ChargeType::Fast.as_raw()]
    );
    assert!(info.ambiguous_state);

    bench.status(ChargeStatus::Charging);
    let info = bench.cycle();
    assert!(!info.ambiguous_state);
    assert_ne!(info.monitor_mode, MonitorMode::EmerLv2);
}

#[test]
fn injected_faults_flow_through_cycle() {
    let cases: [(i64, fn(&BatteryInfo) -> bool, ChargeStatus); 5] = [
        (1, |i| i.full_charged_state, ChargeStatus::Full),
        (2, |i| i.freezed_state, ChargeStatus::NotCharging),
        (3, |i| i.overheated_state, ChargeStatus::NotCharging),
        (4, |i| i.health_state, ChargeStatus::Discharging),
        (5, |i| i.vf_state, ChargeStatus::NotCharging),
    ];

    for (mode, latched, shown) in cases {
        let bench = Bench::new(BattmonConfig::default());
        bench.cell(3_900_000, 60);
        bench.battery.set_injection(mode).unwrap();
        let info = bench.cycle();

        assert!(latched(&info), "mode {mode}: latch not set");
        assert_eq!(bench.battery.indicator().status, shown, "mode {mode}");
        assert!(!info.is_charging_enabled(), "mode {mode}: still charging");
    }
}
