// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

#![no_main]
#![no_std]

use core::cell::RefCell;

use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use critical_section::Mutex;
use panic_halt as _;

#[cfg(feature = "defmt")]
use defmt_rtt as _;

use hal::{
    can::Can,
    pac::{self, interrupt, CAN1, TIM2},
    prelude::*,
    serial::{Config, Serial},
    timer::{CounterHz, Event},
};
use stm32f7xx_hal as hal;

use motornode::{
    config::NodeConfig,
    cron::Cron,
    hw::{BoardPins, CanBus, CanRx, CanTx, Usart},
    monitor::SharedMonitor,
    motors::FeedbackTable,
    node::Node,
};

/// CAN_BTR for 1 Mbit/s from the 16 MHz APB1 clock: 16 tq, sample point at 87.5 %.
const CAN_BTR: u32 = 0x001c_0000;

type Bus = CanTx<CAN1>;

struct App {
    cron: Cron<Node<'static, Bus>>,
    node: Node<'static, Bus>,
    timer: CounterHz<TIM2>,
}

// Written by CAN1_RX0, read by the control jobs.
static FEEDBACK: FeedbackTable = FeedbackTable::new();

// Monitor buffers at a fixed symbol. The debugger writes `MONITOR.write` and reads
// `MONITOR.read`; the idle loop prints the latter.
#[no_mangle]
static MONITOR: SharedMonitor = SharedMonitor::new();

static APP: Mutex<RefCell<Option<App>>> = Mutex::new(RefCell::new(None));
static RX: Mutex<RefCell<Option<CanRx<CAN1>>>> = Mutex::new(RefCell::new(None));

#[entry]
fn main() -> ! {
    // Peripherals
    let dp = pac::Peripherals::take().unwrap();

    // Clocks
    let mut rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.freeze();

    let pins = BoardPins::new(dp.GPIOA);

    // USART1 (DBG)
    let usart_cfg = Config {
        baud_rate: 115_200.bps(),
        ..Default::default()
    };
    let serial = Serial::new(dp.USART1, (pins.usart1.tx, pins.usart1.rx), &clocks, usart_cfg);
    let mut usart = Usart::new(serial);

    // CAN1 (ESC bus)
    let can1 = Can::new(dp.CAN1, &mut rcc.apb1, (pins.can1.tx, pins.can1.rx));
    let mut bus = CanBus::new(can1, CAN_BTR, false, false);
    bus.accept_all();
    let (tx, rx) = bus.split();

    // Control node
    let cfg = NodeConfig::default();
    let mut node = Node::new(&cfg, &FEEDBACK, tx).unwrap();
    node.attach_monitor(&MONITOR);
    let mut cron = Cron::new();
    Node::install(&mut cron).unwrap();
    cron.seal();

    // TIM2 (control tick)
    let mut timer = dp.TIM2.counter_hz(&clocks);
    timer.start(cfg.tick_hz.Hz()).unwrap();
    timer.listen(Event::Update);

    critical_section::with(|cs| {
        RX.borrow_ref_mut(cs).replace(rx);
        APP.borrow_ref_mut(cs).replace(App { cron, node, timer });
    });

    unsafe {
        NVIC::unmask(pac::Interrupt::CAN1_RX0);
        NVIC::unmask(pac::Interrupt::TIM2);
    }

    usart.println("motornode up");

    let mut last_report = 0u32;
    loop {
        let snapshot = MONITOR.snapshot();
        if snapshot.counters.ticks.wrapping_sub(last_report) >= cfg.tick_hz {
            last_report = snapshot.counters.ticks;
            usart.report(&snapshot);
        }

        cortex_m::asm::wfi();
    }
}

#[interrupt]
fn TIM2() {
    critical_section::with(|cs| {
        if let Some(app) = APP.borrow_ref_mut(cs).as_mut() {
            let App { cron, node, timer } = app;
            timer.clear_interrupt(Event::Update);
            cron.tick(node);
        }
    });
}

#[interrupt]
fn CAN1_RX0() {
    critical_section::with(|cs| {
        if let Some(rx) = RX.borrow_ref_mut(cs).as_mut() {
            rx.drain(&FEEDBACK);
        }
    });
}
