use flowstate::{accessor, CancellationToken, Observable, ObservableOptions, Reactive};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

#[derive(Clone, PartialEq, Debug, Default)]
pub struct Cart {
    items: Vec<String>,
    discount: u32,
}

impl Cart {
    fn add(&mut self, item: String) -> &mut Self {
        self.items.push(item);
        self
    }

    fn clear(&mut self) -> &mut Self {
        self.items.clear();
        self
    }

    fn total(&self, unit_price: u32) -> u32 {
        (self.items.len() as u32 * unit_price).saturating_sub(self.discount)
    }
}

accessor! {
    pub Cart {
        fields { items: Vec<String>, discount: u32 }
        mutating {
            fn add(item: String);
            fn clear();
        }
        derived { fn total(unit_price: u32) -> u32; }
    }
}

#[test]
fn cart_round_trip() {
    let cart = Reactive::new(Cart::default());
    let accessor = cart.structural();
    let totals: Arc<Mutex<Vec<u32>>> = Default::default();

    let total = accessor.total().call((10,));
    total.subscribe({
        let totals = totals.clone();
        move |val| totals.lock().unwrap().push(*val)
    });
    let count = accessor.items().to(|items| items.len());

    accessor.add().call((String::from("apple"),));
    accessor.add().call((String::from("pear"),));
    accessor.discount().set(5);
    accessor.clear().call(());

    assert_eq!(0, count.get());
    assert_eq!(0, total.get());
    assert_eq!(vec![10, 20, 15, 0], totals.lock().unwrap().clone());
    assert_eq!(
        Cart {
            items: vec![],
            discount: 5
        },
        cart.get()
    );
}

#[test]
fn token_detaches_a_whole_group_of_listeners() {
    let r = Reactive::new(0);
    let token = CancellationToken::new();
    let seen: Arc<Mutex<Vec<i32>>> = Default::default();

    for offset in [100, 200] {
        let seen = seen.clone();
        r.subscribe_with(
            (move |val: &i32| seen.lock().unwrap().push(val + offset)).into(),
            ObservableOptions::with_signal(token.clone()),
        );
    }

    r.set(1);
    token.cancel();
    r.set(2);

    assert_eq!(vec![101, 201], seen.lock().unwrap().clone());
}

#[test]
fn derived_values_follow_writes_from_other_threads() {
    let r: Reactive<Vec<u32>> = Reactive::default();
    let sum = r.to(|nums| nums.iter().sum::<u32>());

    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let r = r.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    r.update_inplace(|nums| nums.push(n));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    // concurrent dispatches may arrive out of order, re-send the settled value
    r.notify();

    assert_eq!(20, r.get().len());
    assert_eq!(50, sum.get());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn is_usable_from_async_tasks() {
    let r: Reactive<u64> = Reactive::default();
    let doubled = r.to(|n| n * 2);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let r = r.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    r.update(|n| n + 1);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    r.notify();

    assert_eq!(800, r.get());
    assert_eq!(1600, doubled.get());
}
