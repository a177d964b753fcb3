use criterion::{Criterion, criterion_group, criterion_main};
use tether::{Obj, ObjList, Wrapped as _, raw};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("wrap/first_crossing", |b| {
        b.iter(|| {
            let handle = raw::obj_new();
            let obj = unsafe { Obj::from_raw_owned(handle) }.unwrap();

            drop(obj);
        });
    });

    c.bench_function("wrap/identity_hit", |b| {
        let handle = raw::obj_new();
        let keep = unsafe { Obj::from_raw_borrowed(handle) }.unwrap();

        b.iter(|| {
            let again = unsafe { Obj::from_raw_borrowed(handle) }.unwrap();

            drop(again);
        });

        drop(keep);
        unsafe { raw::obj_unref(handle) };
    });

    c.bench_function("marshal/obj_list_of_8", |b| {
        let items: Vec<Obj> = (0..8).map(|_| Obj::new()).collect();

        b.iter(|| {
            let list = ObjList::new(items.iter());

            drop(list);
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
