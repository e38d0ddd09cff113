mod put_loose_object;
