//! Line-following robot firmware: a Pixy2 camera on I2C0 steering a DRV8835 motor driver.
#![no_std]
#![no_main]
#![doc(html_playground_url = "https://play.rust-lang.org/")]
#![warn(missing_docs)]

#[cfg(not(feature = "sim_sensor"))]
use defmt::error;
use defmt::{info, warn};
#[allow(unused_imports)]
use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
#[allow(unused_imports)]
use panic_probe as _;
use rp2040_hal::{
    clocks::init_clocks_and_plls,
    entry,
    fugit::RateExtU32,
    gpio::{FunctionI2C, Pin, Pins, PullUp},
    pac,
    prelude::*,
    pwm::Slices,
    Sio, Timer, Watchdog, I2C,
};

use pixy_line_follower::{
    config::{SteeringConfig, I2C_FREQ_HZ, MOTOR_PWM_TOP, STARTUP_DELAY_MS},
    drive::{DifferentialDrive, MotorOutput, PhEnMotor},
    follower::LineFollower,
};
#[cfg(not(feature = "sim_sensor"))]
use pixy_line_follower::{bus::TimedI2c, pixy2::Pixy2Link};
#[cfg(feature = "sim_sensor")]
use pixy_line_follower::sim::SimulatedLine;

/// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
/// External high-speed crystal on the pico board is 12Mhz
pub const XOSC_FREQ_HZ: u32 = 12_000_000;
/// Ticks between fake detections when running with `sim_sensor`
#[cfg(feature = "sim_sensor")]
const SIM_DETECTION_PERIOD: u32 = 25;

/// Main operation loop
#[entry]
fn main() -> ! {
    info!("Line follower startup");
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let sio = Sio::new(pac.SIO);

    let clocks = init_clocks_and_plls(
        XOSC_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let pins = Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    // Motors: phase on GP16/GP18, enable PWM on GP17 (slice 0 B) and GP19 (slice 1 B)
    let mut pwm_slices = Slices::new(pac.PWM, &mut pac.RESETS);
    pwm_slices.pwm0.set_top(MOTOR_PWM_TOP);
    pwm_slices.pwm0.enable();
    pwm_slices.pwm1.set_top(MOTOR_PWM_TOP);
    pwm_slices.pwm1.enable();
    let mut left_en = pwm_slices.pwm0.channel_b;
    left_en.output_to(pins.gpio17);
    let mut right_en = pwm_slices.pwm1.channel_b;
    right_en.output_to(pins.gpio19);

    let mut motors = DifferentialDrive::new(
        PhEnMotor::new(pins.gpio16.into_push_pull_output(), left_en, MOTOR_PWM_TOP),
        PhEnMotor::new(pins.gpio18.into_push_pull_output(), right_en, MOTOR_PWM_TOP),
    );
    motors
        .stop()
        .unwrap_or_else(|err| warn!("Unable to stop motors during init: {}", err));
    info!("Motor control initialized (PH/EN mode)");

    // Pixy2 on I2C0: SDA GP20, SCL GP21
    let sda: Pin<_, FunctionI2C, PullUp> = pins.gpio20.reconfigure();
    let scl: Pin<_, FunctionI2C, PullUp> = pins.gpio21.reconfigure();
    let i2c = I2C::i2c0(
        pac.I2C0,
        sda,
        scl,
        I2C_FREQ_HZ.Hz(),
        &mut pac.RESETS,
        clocks.system_clock.freq(),
    );

    #[cfg(not(feature = "sim_sensor"))]
    let sensor = {
        let mut pixy = Pixy2Link::new(TimedI2c::new(i2c, move || timer.get_counter()), timer);
        if let Err(err) = pixy.handshake() {
            error!(
                "Pixy2 initialization failed: {}\nCheck I2C connections and Pixy2 power",
                err
            );
            loop {
                cortex_m::asm::wfi();
            }
        }
        pixy
    };
    #[cfg(feature = "sim_sensor")]
    let sensor = {
        warn!("Using simulated line sensor, camera is ignored");
        drop(i2c);
        SimulatedLine::new(SIM_DETECTION_PERIOD)
    };

    info!("Initialization complete, following in {=u32} ms", STARTUP_DELAY_MS);
    timer.delay_ms(STARTUP_DELAY_MS);

    let mut follower = LineFollower::new(
        sensor,
        motors,
        move || timer.get_counter(),
        SteeringConfig::DEFAULT,
    );
    follower.run(&mut timer)
}
