use super::*;

#[test]
fn swap_exchanges_saved_and_os_values() {
    let handle = std::thread::spawn(|| {
        set_last_error(7);
        os::set(3);
        swap();
        assert_eq!(os::get(), 7);
        assert_eq!(last_error(), 3);
        swap();
        assert_eq!(os::get(), 3);
        assert_eq!(last_error(), 7);
    });
    assert!(handle.join().is_ok());
}

#[test]
fn saved_value_is_per_thread() {
    set_last_error(11);
    let other = std::thread::spawn(last_error).join().ok();
    assert_eq!(other, Some(0));
    assert_eq!(last_error(), 11);
}
